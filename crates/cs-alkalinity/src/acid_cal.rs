//! Acid strength from titrations of a certified reference material (CRM).
//!
//! The acid concentration is whatever makes the modelled TA of every CRM
//! titration agree with the certified value, in the least-squares sense.
//! With a polynomial `order` the concentration may drift with time.
//! The minimization is a derivative-free Nelder-Mead run by `argmin`.

use crate::MICRO;
use crate::error::{AlkalinityError, AlkalinityResult};
use crate::ta::AlkalinityModel;
use argmin::core::{CostFunction, Error as ArgminError, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use cs_core::SeawaterState;
use cs_core::numeric::{ensure_finite, polyval};
use cs_core::units::{Mass, as_grams};
use tracing::{debug, warn};

/// Starting acid concentration (mol/kg).
const INITIAL_CONCENTRATION: f64 = 0.1;

/// One titration of the reference material.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationMeasurement {
    /// End-point pH (nominal)
    pub ph: f64,
    pub sample_mass: Mass,
    pub acid_mass: Mass,
    pub state: SeawaterState,
    /// Measurement time, any consistent unit; needed for drift fits
    pub time: Option<f64>,
}

/// Certified alkalinity and the titrations made against it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrmCalibration {
    /// µmol/kg
    pub certified_ta: f64,
    pub measurements: Vec<CalibrationMeasurement>,
}

/// Fitted acid concentration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AcidStrength {
    /// Polynomial in time, highest degree first; a single entry for a
    /// constant concentration.
    pub coefficients: Vec<f64>,
    /// Sum of squared TA misfits at the optimum, (µmol/kg)²
    pub objective: f64,
    pub iterations: usize,
}

impl AcidStrength {
    /// Concentration (mol/kg) at `time`. Constant fits ignore `time`.
    pub fn concentration_at(&self, time: f64) -> f64 {
        polyval(&self.coefficients, time)
    }

    pub fn is_constant(&self) -> bool {
        self.coefficients.len() == 1
    }
}

/// Minimizer settings for [`AcidCalibrator`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationConfig {
    pub max_iterations: u64,
    /// Spread (standard deviation) of the objective over the simplex
    /// vertices at convergence, (µmol/kg)²
    pub sd_tolerance: f64,
    /// Relative perturbation used to build the initial simplex
    pub initial_step: f64,
    /// Absolute perturbation for coefficients that start at zero
    pub zero_step: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            sd_tolerance: 1e-10,
            initial_step: 0.05,
            zero_step: 0.00025,
        }
    }
}

impl CalibrationConfig {
    /// `x0` plus one vertex per coordinate, each perturbed along its axis.
    fn initial_simplex(&self, x0: &[f64]) -> Vec<Vec<f64>> {
        let mut vertices = Vec::with_capacity(x0.len() + 1);
        vertices.push(x0.to_vec());
        for i in 0..x0.len() {
            let mut v = x0.to_vec();
            v[i] = if v[i] != 0.0 {
                v[i] * (1.0 + self.initial_step)
            } else {
                self.zero_step
            };
            vertices.push(v);
        }
        vertices
    }
}

#[derive(Debug, Clone, Default)]
pub struct AcidCalibrator {
    config: CalibrationConfig,
}

impl AcidCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Fit a constant (`order = None`) or a degree-`k` drift polynomial
    /// (`order = Some(k)`).
    pub fn calibrate(
        &self,
        crm: &CrmCalibration,
        order: Option<usize>,
    ) -> AlkalinityResult<AcidStrength> {
        let certified = ensure_finite(crm.certified_ta, "certified TA")?;
        let degree = order.unwrap_or(0);
        if crm.measurements.len() < degree + 1 {
            return Err(AlkalinityError::InvalidArg {
                what: format!(
                    "{} measurements cannot determine a degree {degree} acid strength",
                    crm.measurements.len()
                ),
            });
        }

        let points = crm
            .measurements
            .iter()
            .enumerate()
            .map(|(i, m)| Titration::new(i, m, order.is_some()))
            .collect::<AlkalinityResult<Vec<_>>>()?;

        let mut x0 = vec![0.0; degree + 1];
        x0[degree] = INITIAL_CONCENTRATION;

        let solver = NelderMead::new(self.config.initial_simplex(&x0))
            .with_sd_tolerance(self.config.sd_tolerance)
            .map_err(setup_error)?;
        let objective = CrmMisfit {
            points: &points,
            certified,
        };
        let result = Executor::new(objective, solver)
            .configure(|state| state.max_iters(self.config.max_iterations))
            .run()
            .map_err(setup_error)?;

        let state = result.state();
        let iterations = state.get_iter();
        let value = state.get_best_cost();
        let coefficients = state.get_best_param().cloned().unwrap_or(x0);
        match state.get_termination_reason() {
            Some(TerminationReason::SolverConverged) => {}
            reason => {
                warn!(iterations, value, ?reason, "acid calibration did not converge");
                return Err(AlkalinityError::DidNotConverge {
                    what: format!(
                        "acid strength minimizer stopped after {iterations} iterations ({reason:?})"
                    ),
                    last_iterate: coefficients,
                    residual: value,
                });
            }
        }

        debug!(degree, objective = value, iterations, "acid strength calibrated");
        Ok(AcidStrength {
            coefficients,
            objective: value,
            iterations: iterations as usize,
        })
    }
}

fn setup_error(err: ArgminError) -> AlkalinityError {
    AlkalinityError::InvalidArg {
        what: format!("acid strength minimizer: {err}"),
    }
}

/// Sum of squared TA misfits against the certified value, (µmol/kg)².
struct CrmMisfit<'a> {
    points: &'a [Titration],
    certified: f64,
}

impl CostFunction for CrmMisfit<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, coefficients: &Self::Param) -> Result<Self::Output, ArgminError> {
        let mut sum = 0.0;
        for p in self.points {
            let c = polyval(coefficients, p.time);
            if !(c > 0.0 && c.is_finite()) {
                return Ok(f64::INFINITY);
            }
            let misfit = p.ta(c) * MICRO - self.certified;
            sum += misfit * misfit;
        }
        // NaN would break the vertex ordering.
        Ok(if sum.is_finite() { sum } else { f64::INFINITY })
    }
}

/// A measurement with its validated inputs and model.
struct Titration {
    model: AlkalinityModel,
    ph: f64,
    sample_g: f64,
    acid_g: f64,
    time: f64,
}

impl Titration {
    fn new(index: usize, m: &CalibrationMeasurement, needs_time: bool) -> AlkalinityResult<Self> {
        let time = match (m.time, needs_time) {
            (Some(t), _) if t.is_finite() => t,
            (None, false) => 0.0,
            (t, _) => {
                return Err(AlkalinityError::InvalidArg {
                    what: format!("measurement {index} needs a finite time for a drift fit, got {t:?}"),
                });
            }
        };
        let model = AlkalinityModel::new(&m.state);
        let (sample_g, acid_g) = (as_grams(m.sample_mass), as_grams(m.acid_mass));
        // Validate once with a placeholder concentration.
        model.ta(m.ph, sample_g, acid_g, INITIAL_CONCENTRATION)?;
        Ok(Self {
            model,
            ph: m.ph,
            sample_g,
            acid_g,
            time,
        })
    }

    fn ta(&self, acid_concentration: f64) -> f64 {
        self.model
            .ta_at_h(10f64.powf(-self.ph), self.sample_g, self.acid_g, acid_concentration)
    }
}
