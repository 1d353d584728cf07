//! Bounded, robust least-squares decomposition of a spectrum into acid and
//! base contributions.

use crate::error::{SpectraError, SpectraResult};
use crate::mixture::{MixtureParameters, N_PARAMS, PARAM_NAMES, initial_guess};
use crate::reference::ReferenceSpectrum;
use crate::spectrum::Spectrum;
use cs_core::{CorrelatedValue, correlated_values};
use cs_solver::{Bounds, LeastSquaresConfig, LeastSquaresProblem, SolverResult, least_squares};
use nalgebra::{DMatrix, DVector, Matrix5, SymmetricEigen};
use tracing::{debug, warn};

/// Reciprocal condition number of JᵗJ below which the covariance is refused.
const MIN_RCOND: f64 = 1e-14;

/// Mixture fit configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    pub solver: LeastSquaresConfig,
    /// Number of trailing samples averaged for the starting background
    pub tail_samples: usize,
    /// Bounds on the wavelength shift `c` (nm)
    pub shift_bounds: (f64, f64),
    /// Bounds on the wavelength stretch `m`
    pub stretch_bounds: (f64, f64),
    /// Bounds on `bkg`; `None` leaves it free
    pub background_bounds: Option<(f64, f64)>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            solver: LeastSquaresConfig::default(),
            tail_samples: 10,
            shift_bounds: (-20.0, 20.0),
            stretch_bounds: (0.98, 1.02),
            background_bounds: None,
        }
    }
}

impl FitConfig {
    fn bounds(&self) -> SpectraResult<Bounds> {
        let (bkg_lo, bkg_hi) = self
            .background_bounds
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
        Ok(Bounds::new(
            vec![0.0, 0.0, bkg_lo, self.shift_bounds.0, self.stretch_bounds.0],
            vec![
                f64::INFINITY,
                f64::INFINITY,
                bkg_hi,
                self.shift_bounds.1,
                self.stretch_bounds.1,
            ],
        )?)
    }
}

/// Mixture parameters at the optimum together with their covariance.
#[derive(Clone, Debug, PartialEq)]
pub struct MixtureFit {
    pub params: MixtureParameters,
    /// Covariance in `(a, b, bkg, c, m)` order
    pub covariance: Matrix5<f64>,
    /// Final `½ Σ ρ(rᵢ²)`
    pub cost: f64,
    /// Root mean square of the raw (unweighted) residuals
    pub residual_rms: f64,
    pub iterations: usize,
}

impl MixtureFit {
    /// Standard deviation of each parameter.
    pub fn std_devs(&self) -> [f64; N_PARAMS] {
        std::array::from_fn(|i| self.covariance[(i, i)].max(0.0).sqrt())
    }

    /// Parameters as correlated values sharing one uncertainty basis.
    pub fn correlated(&self) -> SpectraResult<CorrelatedMixture> {
        let cov = DMatrix::from_iterator(N_PARAMS, N_PARAMS, self.covariance.iter().copied());
        let values = correlated_values(&PARAM_NAMES, &self.params.to_array(), cov)?;
        let [a, b, bkg, c, m]: [CorrelatedValue; N_PARAMS] =
            values.try_into().map_err(|v: Vec<CorrelatedValue>| {
                SpectraError::InvalidSpectrum {
                    what: format!("expected {N_PARAMS} correlated parameters, got {}", v.len()),
                }
            })?;
        Ok(CorrelatedMixture { a, b, bkg, c, m })
    }
}

/// Mixture parameters carrying their joint uncertainty.
#[derive(Clone, Debug)]
pub struct CorrelatedMixture {
    pub a: CorrelatedValue,
    pub b: CorrelatedValue,
    pub bkg: CorrelatedValue,
    pub c: CorrelatedValue,
    pub m: CorrelatedValue,
}

impl CorrelatedMixture {
    /// `F = b / a` with the a-b covariance included.
    pub fn fraction_ratio(&self) -> CorrelatedValue {
        &self.b / &self.a
    }

    pub fn to_array(&self) -> [CorrelatedValue; N_PARAMS] {
        [
            self.a.clone(),
            self.b.clone(),
            self.bkg.clone(),
            self.c.clone(),
            self.m.clone(),
        ]
    }
}

/// Residual model: `(model − y) / σ`.
struct MixtureModel<'a, A: ?Sized, B: ?Sized> {
    wavelength: &'a [f64],
    absorbance: &'a [f64],
    inv_sigma: Option<Vec<f64>>,
    acid: &'a A,
    base: &'a B,
}

impl<A, B> LeastSquaresProblem for MixtureModel<'_, A, B>
where
    A: ReferenceSpectrum + ?Sized,
    B: ReferenceSpectrum + ?Sized,
{
    fn residuals(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let p = MixtureParameters::from_vector(x);
        let mut r = DVector::from_iterator(
            self.wavelength.len(),
            self.wavelength
                .iter()
                .zip(self.absorbance)
                .map(|(&wv, &y)| p.evaluate(wv, self.acid, self.base) - y),
        );
        if let Some(w) = &self.inv_sigma {
            r.iter_mut().zip(w).for_each(|(ri, wi)| *ri *= wi);
        }
        Ok(r)
    }

    fn jacobian(&self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
        let p = MixtureParameters::from_vector(x);
        let mut jac = p.jacobian(self.wavelength, self.acid, self.base);
        if let Some(w) = &self.inv_sigma {
            for (mut row, wi) in jac.row_iter_mut().zip(w) {
                row *= *wi;
            }
        }
        Ok(jac)
    }

    fn is_admissible(&self, x: &DVector<f64>) -> bool {
        let admissible =
            MixtureParameters::from_vector(x).within_domain(self.wavelength, self.acid, self.base);
        if !admissible {
            warn!(params = ?x.as_slice(), "trial wavelength correction leaves reference domain");
        }
        admissible
    }
}

/// Decomposes spectra into acid and base dye contributions.
#[derive(Clone, Debug, Default)]
pub struct SpectralMixtureFitter {
    config: FitConfig,
}

impl SpectralMixtureFitter {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit `spectrum` from the heuristic starting point.
    ///
    /// `sigma`, when given, is the per-sample standard deviation; residuals
    /// and Jacobian rows are divided by it.
    pub fn fit<A, B>(
        &self,
        spectrum: &Spectrum,
        acid: &A,
        base: &B,
        sigma: Option<&[f64]>,
    ) -> SpectraResult<MixtureFit>
    where
        A: ReferenceSpectrum + ?Sized,
        B: ReferenceSpectrum + ?Sized,
    {
        check_coverage(spectrum, acid, "acid")?;
        check_coverage(spectrum, base, "base")?;
        let start = initial_guess(spectrum, acid, base, self.config.tail_samples)?;
        self.fit_with_start(spectrum, acid, base, sigma, start)
    }

    /// Fit `spectrum` from an explicit starting point (clipped to the bounds).
    pub fn fit_with_start<A, B>(
        &self,
        spectrum: &Spectrum,
        acid: &A,
        base: &B,
        sigma: Option<&[f64]>,
        start: MixtureParameters,
    ) -> SpectraResult<MixtureFit>
    where
        A: ReferenceSpectrum + ?Sized,
        B: ReferenceSpectrum + ?Sized,
    {
        check_coverage(spectrum, acid, "acid")?;
        check_coverage(spectrum, base, "base")?;
        let inv_sigma = sigma.map(|s| inverse_sigma(s, spectrum.len())).transpose()?;

        let model = MixtureModel {
            wavelength: spectrum.wavelength(),
            absorbance: spectrum.absorbance(),
            inv_sigma,
            acid,
            base,
        };
        let bounds = self.config.bounds()?;
        let x0 = bounds.clip(&start.to_vector());
        if !model.is_admissible(&x0) {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("starting point {start:?} maps the spectrum outside the references"),
            });
        }

        let result = least_squares(&model, &x0, &bounds, &self.config.solver)?;
        let params = MixtureParameters::from_vector(&result.x);

        let n = spectrum.len();
        let raw_rss: f64 = match &model.inv_sigma {
            None => result.residuals.norm_squared(),
            Some(w) => result
                .residuals
                .iter()
                .zip(w)
                .map(|(r, wi)| (r / wi).powi(2))
                .sum(),
        };
        let residual_rms = (raw_rss / n as f64).sqrt();

        let s_sq = 2.0 * result.cost / (n - N_PARAMS) as f64;
        let covariance = covariance_from_jacobian(&result.jacobian, s_sq).ok_or_else(|| {
            warn!(params = ?params.to_array(), "JᵗJ is rank deficient at the optimum");
            SpectraError::SingularCovariance {
                what: format!(
                    "JᵗJ not invertible at the optimum after {} iterations",
                    result.iterations
                ),
                params,
            }
        })?;

        debug!(
            iterations = result.iterations,
            cost = result.cost,
            residual_rms,
            f = params.fraction_ratio(),
            "mixture fit converged"
        );

        Ok(MixtureFit {
            params,
            covariance,
            cost: result.cost,
            residual_rms,
            iterations: result.iterations,
        })
    }
}

/// The spectrum must lie inside the reference domain before any correction.
fn check_coverage<R: ReferenceSpectrum + ?Sized>(
    spectrum: &Spectrum,
    reference: &R,
    which: &str,
) -> SpectraResult<()> {
    let (first, last) = spectrum.range();
    let (lo, hi) = reference.domain();
    if first < lo || last > hi {
        return Err(SpectraError::InvalidSpectrum {
            what: format!(
                "spectrum spans [{first}, {last}] nm but the {which} reference covers [{lo}, {hi}]"
            ),
        });
    }
    Ok(())
}

fn inverse_sigma(sigma: &[f64], n: usize) -> SpectraResult<Vec<f64>> {
    if sigma.len() != n {
        return Err(SpectraError::InvalidSpectrum {
            what: format!("{} sigma values for {n} samples", sigma.len()),
        });
    }
    if let Some(i) = sigma.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(SpectraError::InvalidSpectrum {
            what: format!("sigma[{i}] = {} must be positive and finite", sigma[i]),
        });
    }
    Ok(sigma.iter().map(|s| 1.0 / s).collect())
}

/// `s²·(JᵗJ)⁻¹`, or `None` when JᵗJ is numerically singular.
fn covariance_from_jacobian(jac: &DMatrix<f64>, s_sq: f64) -> Option<Matrix5<f64>> {
    let jtj_dyn = jac.transpose() * jac;
    let jtj = Matrix5::from_iterator(jtj_dyn.iter().copied());

    let eigen = SymmetricEigen::new(jtj);
    let max = eigen.eigenvalues.amax();
    let min = eigen.eigenvalues.min();
    if !(max > 0.0) || min / max < MIN_RCOND {
        return None;
    }

    let inverse = jtj.cholesky()?.inverse();
    let cov = inverse * s_sq;
    // Symmetrize away round-off
    let cov = (cov + cov.transpose()) * 0.5;
    cov.iter().all(|v| v.is_finite()).then_some(cov)
}
