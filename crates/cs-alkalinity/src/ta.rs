//! Closed-form alkalinity of an acidified sample and its inverses.
//!
//! After adding `m` g of acid of concentration `C` to `m0` g of sample, the
//! protons not consumed by the sample's alkalinity are held as free H⁺,
//! HSO4⁻ and HF:
//!
//! `TA = (m·C − (m0 + m)·([H⁺]F + [HSO4⁻] + [HF])) / m0`   (mol/kg)

use crate::MICRO;
use crate::error::{AlkalinityError, AlkalinityResult};
use crate::species::SpeciesConstants;
use cs_core::numeric::{ensure_finite, ensure_positive};
use cs_core::units::{Mass, as_grams, grams};
use cs_core::{SeawaterState, constants::LN_10};
use cs_solver::{NewtonConfig, newton_scalar};
use tracing::debug;

/// Initial guess for the end-point pH.
const PH_START: f64 = 3.0;
/// Initial guess for the acid mass (g).
const ACID_MASS_START: f64 = 1.0;
/// Sane end-point pH range.
const PH_RANGE: (f64, f64) = (0.0, 14.0);
/// Range Newton may explore while searching for the end point.
const PH_SEARCH: (f64, f64) = (-5.0, 20.0);

/// One titration: sample and acid masses, acid strength and sample state.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TitrationSample {
    pub sample_mass: Mass,
    pub acid_mass: Mass,
    /// Acid concentration (mol/kg)
    pub acid_concentration: f64,
    pub state: SeawaterState,
}

impl TitrationSample {
    pub fn new(
        sample_mass: Mass,
        acid_mass: Mass,
        acid_concentration: f64,
        state: SeawaterState,
    ) -> AlkalinityResult<Self> {
        check_inputs(as_grams(sample_mass), as_grams(acid_mass), acid_concentration)?;
        Ok(Self {
            sample_mass,
            acid_mass,
            acid_concentration,
            state,
        })
    }

    pub fn sample_grams(&self) -> f64 {
        as_grams(self.sample_mass)
    }

    pub fn acid_grams(&self) -> f64 {
        as_grams(self.acid_mass)
    }

    pub fn model(&self) -> AlkalinityModel {
        AlkalinityModel::new(&self.state)
    }

    /// TA (mol/kg) at end-point `ph`.
    pub fn ta(&self, ph: f64) -> AlkalinityResult<f64> {
        self.model()
            .ta(ph, self.sample_grams(), self.acid_grams(), self.acid_concentration)
    }
}

fn check_inputs(sample_g: f64, acid_g: f64, acid_concentration: f64) -> AlkalinityResult<()> {
    ensure_positive(sample_g, "sample mass")?;
    ensure_positive(acid_g, "acid mass")?;
    ensure_positive(acid_concentration, "acid concentration")?;
    Ok(())
}

/// Alkalinity model at one seawater state. Masses are in grams.
#[derive(Debug, Clone)]
pub struct AlkalinityModel {
    species: SpeciesConstants,
    newton: NewtonConfig,
}

impl AlkalinityModel {
    pub fn new(state: &SeawaterState) -> Self {
        Self::with_newton(state, NewtonConfig::default())
    }

    pub fn with_newton(state: &SeawaterState, newton: NewtonConfig) -> Self {
        Self {
            species: SpeciesConstants::at(state),
            newton,
        }
    }

    pub fn species(&self) -> &SpeciesConstants {
        &self.species
    }

    /// TA (mol/kg) for end-point `ph`.
    pub fn ta(
        &self,
        ph: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        ensure_finite(ph, "pH")?;
        check_inputs(sample_g, acid_g, acid_concentration)?;
        Ok(self.ta_at_h(10f64.powf(-ph), sample_g, acid_g, acid_concentration))
    }

    pub(crate) fn ta_at_h(&self, h: f64, sample_g: f64, acid_g: f64, acid_concentration: f64) -> f64 {
        (acid_g * acid_concentration - (sample_g + acid_g) * self.species.excess_protons(h))
            / sample_g
    }

    /// End-point pH that gives `ta` (mol/kg), by Newton iteration from pH 3.
    pub fn ph_from_ta(
        &self,
        ta: f64,
        sample_g: f64,
        acid_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        ensure_finite(ta, "TA")?;
        check_inputs(sample_g, acid_g, acid_concentration)?;

        // Residual in µmol/kg so the tolerances are meaningful.
        let (ph, result) = newton_scalar(
            PH_START,
            |ph| {
                let h = 10f64.powf(-ph);
                Ok((self.ta_at_h(h, sample_g, acid_g, acid_concentration) - ta) * MICRO)
            },
            |ph| Ok(self.d_ta_d_ph_at(ph, sample_g, acid_g) * MICRO),
            |ph| ph.is_finite() && (PH_SEARCH.0..=PH_SEARCH.1).contains(&ph),
            &self.newton,
        )?;
        debug!(ta, ph, iterations = result.iterations, "pH from TA");

        if !(PH_RANGE.0..=PH_RANGE.1).contains(&ph) {
            return Err(AlkalinityError::ChemicallyImplausible {
                what: "end-point pH",
                value: ph,
            });
        }
        Ok(ph)
    }

    /// Acid mass (g) that brings a sample of alkalinity `ta` to `ph`, by
    /// Newton iteration from 1 g.
    pub fn acid_mass_from_ph_ta(
        &self,
        ph: f64,
        ta: f64,
        sample_g: f64,
        acid_concentration: f64,
    ) -> AlkalinityResult<f64> {
        ensure_finite(ph, "pH")?;
        ensure_finite(ta, "TA")?;
        ensure_positive(sample_g, "sample mass")?;
        ensure_positive(acid_concentration, "acid concentration")?;

        let h = 10f64.powf(-ph);
        let (acid_g, result) = newton_scalar(
            ACID_MASS_START,
            |m| Ok((self.ta_at_h(h, sample_g, m, acid_concentration) - ta) * MICRO),
            |_| Ok(self.d_ta_d_acid_mass_at(h, sample_g, acid_concentration) * MICRO),
            |m| m.is_finite() && m > -sample_g,
            &self.newton,
        )?;
        debug!(ta, ph, acid_g, iterations = result.iterations, "acid mass from pH and TA");

        if acid_g < 0.0 {
            return Err(AlkalinityError::ChemicallyImplausible {
                what: "acid mass",
                value: acid_g,
            });
        }
        Ok(acid_g)
    }

    /// `∂TA/∂pH` without input validation.
    pub(crate) fn d_ta_d_ph_at(&self, ph: f64, sample_g: f64, acid_g: f64) -> f64 {
        let h = 10f64.powf(-ph);
        self.d_ta_d_h_at(h, sample_g, acid_g) * (-LN_10 * h)
    }

    pub(crate) fn d_ta_d_h_at(&self, h: f64, sample_g: f64, acid_g: f64) -> f64 {
        -(sample_g + acid_g) / sample_g * self.species.d_excess_protons_d_h(h)
    }

    pub(crate) fn d_ta_d_acid_mass_at(&self, h: f64, sample_g: f64, acid_concentration: f64) -> f64 {
        (acid_concentration - self.species.excess_protons(h)) / sample_g
    }
}

/// TA (mol/kg) of `sample` at end-point `ph`.
pub fn ta_from_ph(ph: f64, sample: &TitrationSample) -> AlkalinityResult<f64> {
    sample.ta(ph)
}

/// End-point pH reached by `sample` if its alkalinity is `ta` (mol/kg).
pub fn ph_from_ta(ta: f64, sample: &TitrationSample) -> AlkalinityResult<f64> {
    sample.model().ph_from_ta(
        ta,
        sample.sample_grams(),
        sample.acid_grams(),
        sample.acid_concentration,
    )
}

/// Acid mass that brings `sample_mass` of alkalinity `ta` to end-point `ph`.
pub fn acid_mass_from_ph_ta(
    ph: f64,
    ta: f64,
    sample_mass: Mass,
    state: &SeawaterState,
    acid_concentration: f64,
) -> AlkalinityResult<Mass> {
    let acid_g = AlkalinityModel::new(state).acid_mass_from_ph_ta(
        ph,
        ta,
        as_grams(sample_mass),
        acid_concentration,
    )?;
    Ok(grams(acid_g))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TitrationSample {
        TitrationSample::new(grams(50.0), grams(1.5), 0.1, SeawaterState::standard()).unwrap()
    }

    #[test]
    fn scenario_ta_and_inverse() {
        let s = sample();
        let ph = -(1e-4_f64 / 0.5143).log10();
        let ta = ta_from_ph(ph, &s).unwrap();
        assert!(ta > 0.0);
        assert!((ta * MICRO - 2794.0).abs() < 2.0, "{}", ta * MICRO);
        let back = ph_from_ta(ta, &s).unwrap();
        assert!((back - ph).abs() < 1e-8);
    }

    #[test]
    fn more_acid_means_lower_ph() {
        let model = AlkalinityModel::new(&SeawaterState::standard());
        let ta = 2300e-6;
        let low = model.ph_from_ta(ta, 50.0, 1.6, 0.1).unwrap();
        let high = model.ph_from_ta(ta, 50.0, 1.4, 0.1).unwrap();
        assert!(low < high);
    }

    #[test]
    fn acid_mass_inverse() {
        let s = sample();
        let ph = 3.6;
        let ta = ta_from_ph(ph, &s).unwrap();
        let m = acid_mass_from_ph_ta(ph, ta, s.sample_mass, &s.state, 0.1).unwrap();
        assert!((as_grams(m) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn negative_acid_mass_is_implausible() {
        let model = AlkalinityModel::new(&SeawaterState::standard());
        // Alkalinity so negative that acid would have to be removed.
        let err = model.acid_mass_from_ph_ta(5.0, -0.01, 50.0, 0.1).unwrap_err();
        assert!(matches!(
            err,
            AlkalinityError::ChemicallyImplausible { what: "acid mass", .. }
        ));
    }

    #[test]
    fn unreachable_ta_does_not_converge() {
        // TA above m·C/m0 cannot be reached at any pH.
        let model = AlkalinityModel::new(&SeawaterState::standard());
        let err = model.ph_from_ta(0.01, 50.0, 1.5, 0.1).unwrap_err();
        assert!(matches!(
            err,
            AlkalinityError::DidNotConverge { .. } | AlkalinityError::ChemicallyImplausible { .. }
        ));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let model = AlkalinityModel::new(&SeawaterState::standard());
        assert!(matches!(
            model.ta(3.5, 0.0, 1.5, 0.1),
            Err(AlkalinityError::InvalidArg { .. })
        ));
        assert!(model.ta(3.5, 50.0, -1.0, 0.1).is_err());
        assert!(model.ta(f64::NAN, 50.0, 1.5, 0.1).is_err());
        assert!(TitrationSample::new(grams(50.0), grams(1.5), 0.0, SeawaterState::standard()).is_err());
    }
}
