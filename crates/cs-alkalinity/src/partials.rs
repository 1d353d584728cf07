//! Sensitivities of TA to its inputs and the resulting uncertainty.

use crate::error::{AlkalinityError, AlkalinityResult};
use crate::ta::{AlkalinityModel, TitrationSample};
use cs_core::units::{Mass, as_grams, grams};
use cs_core::{CorrelatedValue, UncertaintyBasis};
use std::sync::Arc;

/// Basis names for the titration inputs appended to a pH basis.
pub const INPUT_NAMES: [&str; 3] = ["sample_mass", "acid_mass", "acid_concentration"];

impl AlkalinityModel {
    /// `∂TA/∂m_acid` (mol/kg per g).
    pub fn d_ta_d_acid_mass(
        &self,
        ph: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        self.ta(ph, sample_g, acid_g, acid_concentration)?;
        Ok(self.d_ta_d_acid_mass_at(10f64.powf(-ph), sample_g, acid_concentration))
    }

    /// `∂TA/∂m_sample` (mol/kg per g).
    pub fn d_ta_d_sample_mass(
        &self,
        ph: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        let ta = self.ta(ph, sample_g, acid_g, acid_concentration)?;
        let g = self.species().excess_protons(10f64.powf(-ph));
        Ok(-(g + ta) / sample_g)
    }

    /// `∂TA/∂[H⁺]`.
    pub fn d_ta_d_h(
        &self,
        ph: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        self.ta(ph, sample_g, acid_g, acid_concentration)?;
        Ok(self.d_ta_d_h_at(10f64.powf(-ph), sample_g, acid_g))
    }

    /// `∂TA/∂pH`. Positive: a higher end point means less excess acid.
    pub fn d_ta_d_ph(
        &self,
        ph: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        self.ta(ph, sample_g, acid_g, acid_concentration)?;
        Ok(self.d_ta_d_ph_at(ph, sample_g, acid_g))
    }

    /// `∂TA/∂C`.
    pub fn d_ta_d_acid_concentration(
        &self,
        ph: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        self.ta(ph, sample_g, acid_g, acid_concentration)?;
        Ok(acid_g / sample_g)
    }
}

/// All partial derivatives of TA at one operating point. Mass partials are
/// per gram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaPartials {
    pub ta: f64,
    pub acid_mass: f64,
    pub sample_mass: f64,
    pub h: f64,
    pub ph: f64,
    pub acid_concentration: f64,
}

impl TaPartials {
    pub fn at(ph: f64, sample: &TitrationSample) -> AlkalinityResult<Self> {
        let model = sample.model();
        let (m0, m, c) = (sample.sample_grams(), sample.acid_grams(), sample.acid_concentration);
        Ok(Self {
            ta: model.ta(ph, m0, m, c)?,
            acid_mass: model.d_ta_d_acid_mass(ph, m0, m, c)?,
            sample_mass: model.d_ta_d_sample_mass(ph, m0, m, c)?,
            h: model.d_ta_d_h(ph, m0, m, c)?,
            ph: model.d_ta_d_ph(ph, m0, m, c)?,
            acid_concentration: model.d_ta_d_acid_concentration(ph, m0, m, c)?,
        })
    }
}

/// TA carrying the uncertainty of a correlated pH; the titration inputs are
/// taken as exact.
pub fn ta_from_ph_correlated(
    ph: &CorrelatedValue,
    sample: &TitrationSample,
) -> AlkalinityResult<CorrelatedValue> {
    let partials = TaPartials::at(ph.nominal(), sample)?;
    Ok(ph.map(partials.ta, partials.ph))
}

/// Standard uncertainties of the titration inputs, all independent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaUncertainty {
    pub sample_mass_sd: Mass,
    pub acid_mass_sd: Mass,
    /// mol/kg
    pub acid_concentration_sd: f64,
}

impl Default for TaUncertainty {
    fn default() -> Self {
        Self {
            sample_mass_sd: grams(0.0),
            acid_mass_sd: grams(0.0),
            acid_concentration_sd: 0.0,
        }
    }
}

impl TaUncertainty {
    fn std_devs(&self) -> AlkalinityResult<[f64; 3]> {
        let sds = [
            as_grams(self.sample_mass_sd),
            as_grams(self.acid_mass_sd),
            self.acid_concentration_sd,
        ];
        for (name, sd) in INPUT_NAMES.iter().zip(sds) {
            if !sd.is_finite() || sd < 0.0 {
                return Err(AlkalinityError::InvalidArg {
                    what: format!("{name} standard deviation must be non-negative, got {sd}"),
                });
            }
        }
        Ok(sds)
    }
}

/// Variance contributions to TA, in (mol/kg)².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaBudget {
    pub ta: f64,
    pub ph: f64,
    pub sample_mass: f64,
    pub acid_mass: f64,
    pub acid_concentration: f64,
    pub total_sd: f64,
}

impl TaBudget {
    pub fn total_variance(&self) -> f64 {
        self.total_sd * self.total_sd
    }

    /// Share of the total variance due to pH.
    pub fn ph_fraction(&self) -> f64 {
        let total = self.total_variance();
        if total > 0.0 { self.ph / total } else { 0.0 }
    }
}

/// Per-source breakdown of the TA variance.
pub fn ta_budget(
    ph: &CorrelatedValue,
    sample: &TitrationSample,
    uncertainty: &TaUncertainty,
) -> AlkalinityResult<TaBudget> {
    let [sd_m0, sd_m, sd_c] = uncertainty.std_devs()?;
    let p = TaPartials::at(ph.nominal(), sample)?;

    let ph_var = (p.ph * ph.std_dev()).powi(2);
    let sample_mass = (p.sample_mass * sd_m0).powi(2);
    let acid_mass = (p.acid_mass * sd_m).powi(2);
    let acid_concentration = (p.acid_concentration * sd_c).powi(2);
    Ok(TaBudget {
        ta: p.ta,
        ph: ph_var,
        sample_mass,
        acid_mass,
        acid_concentration,
        total_sd: (ph_var + sample_mass + acid_mass + acid_concentration).sqrt(),
    })
}

/// TA on the pH basis extended with the titration inputs, so it stays
/// correlated with everything else derived from the same spectrum.
pub fn ta_with_inputs(
    ph: &CorrelatedValue,
    sample: &TitrationSample,
    uncertainty: &TaUncertainty,
) -> AlkalinityResult<CorrelatedValue> {
    let sds = uncertainty.std_devs()?;
    let basis: Arc<UncertaintyBasis> = match ph.basis() {
        Some(own) => {
            let extra: Vec<(&str, f64)> = INPUT_NAMES.iter().copied().zip(sds).collect();
            own.extend_independent(&extra)?
        }
        None => UncertaintyBasis::independent(&INPUT_NAMES, &sds)?,
    };
    let offset = basis.len() - INPUT_NAMES.len();
    let ph = ph.lift(&basis)?;

    let p = TaPartials::at(ph.nominal(), sample)?;
    let (m0, m, c) = (sample.sample_grams(), sample.acid_grams(), sample.acid_concentration);
    let m0_v = basis.variable(offset, m0)?;
    let m_v = basis.variable(offset + 1, m)?;
    let c_v = basis.variable(offset + 2, c)?;

    Ok(ph.map(p.ta, p.ph)
        + (m0_v - m0) * p.sample_mass
        + (m_v - m) * p.acid_mass
        + (c_v - c) * p.acid_concentration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::SeawaterState;
    use cs_solver::jacobian::central_difference;

    fn sample() -> TitrationSample {
        TitrationSample::new(grams(50.0), grams(1.5), 0.1, SeawaterState::standard()).unwrap()
    }

    fn close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * a.abs().max(b.abs())
    }

    #[test]
    fn partials_match_finite_differences() {
        let model = AlkalinityModel::new(&SeawaterState::standard());
        let (ph, m0, m, c) = (3.7, 50.0, 1.5, 0.1);
        let p = TaPartials::at(ph, &sample()).unwrap();

        let d_m = central_difference(|x| Ok(model.ta(ph, m0, x, c).unwrap()), m, 1e-6).unwrap();
        let d_m0 = central_difference(|x| Ok(model.ta(ph, x, m, c).unwrap()), m0, 1e-6).unwrap();
        let d_c = central_difference(|x| Ok(model.ta(ph, m0, m, x).unwrap()), c, 1e-6).unwrap();
        let d_ph = central_difference(|x| Ok(model.ta(x, m0, m, c).unwrap()), ph, 1e-7).unwrap();
        let h = 10f64.powf(-ph);
        let d_h = central_difference(
            |x| Ok(model.ta(-x.log10(), m0, m, c).unwrap()),
            h,
            1e-4 * h,
        )
        .unwrap();

        assert!(close(p.acid_mass, d_m, 1e-6), "{} vs {d_m}", p.acid_mass);
        assert!(close(p.sample_mass, d_m0, 1e-6), "{} vs {d_m0}", p.sample_mass);
        assert!(close(p.acid_concentration, d_c, 1e-6));
        assert!(close(p.ph, d_ph, 1e-5), "{} vs {d_ph}", p.ph);
        assert!(close(p.h, d_h, 1e-6), "{} vs {d_h}", p.h);
        assert!(p.ph > 0.0);
    }

    #[test]
    fn correlated_ta_scales_ph_uncertainty() {
        let basis = UncertaintyBasis::independent(&["pH"], &[0.002]).unwrap();
        let ph = basis.variable(0, 3.7).unwrap();
        let ta = ta_from_ph_correlated(&ph, &sample()).unwrap();
        let p = TaPartials::at(3.7, &sample()).unwrap();
        assert!(close(ta.nominal(), p.ta, 1e-14));
        assert!(close(ta.std_dev(), p.ph * 0.002, 1e-12));
    }

    #[test]
    fn budget_matches_extended_basis() {
        let basis = UncertaintyBasis::independent(&["pH"], &[0.003]).unwrap();
        let ph = basis.variable(0, 3.7).unwrap();
        let uncertainty = TaUncertainty {
            sample_mass_sd: grams(0.005),
            acid_mass_sd: grams(0.001),
            acid_concentration_sd: 1e-5,
        };
        let budget = ta_budget(&ph, &sample(), &uncertainty).unwrap();
        let ta = ta_with_inputs(&ph, &sample(), &uncertainty).unwrap();

        assert!(close(ta.nominal(), budget.ta, 1e-14));
        assert!(close(ta.std_dev(), budget.total_sd, 1e-10));
        // Only the pH part of TA co-varies with pH.
        let ph_lifted = ph.lift(ta.basis().unwrap()).unwrap();
        let slope = TaPartials::at(3.7, &sample()).unwrap().ph;
        assert!(close(ta.covariance_with(&ph_lifted).unwrap(), slope * 0.003 * 0.003, 1e-9));
        assert!(budget.ph_fraction() > 0.0 && budget.ph_fraction() < 1.0);
    }

    #[test]
    fn exact_ph_gets_a_fresh_basis() {
        let ph = CorrelatedValue::constant(3.7);
        let uncertainty = TaUncertainty {
            acid_concentration_sd: 2e-5,
            ..TaUncertainty::default()
        };
        let ta = ta_with_inputs(&ph, &sample(), &uncertainty).unwrap();
        assert_eq!(ta.basis().unwrap().len(), 3);
        assert!(close(ta.std_dev(), 1.5 / 50.0 * 2e-5, 1e-12));

        let budget = ta_budget(&ph, &sample(), &uncertainty).unwrap();
        assert_eq!(budget.ph, 0.0);
        assert_eq!(budget.ph_fraction(), 0.0);
    }

    #[test]
    fn negative_uncertainty_is_rejected() {
        let ph = CorrelatedValue::constant(3.7);
        let uncertainty = TaUncertainty {
            acid_mass_sd: grams(-0.1),
            ..TaUncertainty::default()
        };
        assert!(matches!(
            ta_budget(&ph, &sample(), &uncertainty),
            Err(AlkalinityError::InvalidArg { .. })
        ));
    }
}
