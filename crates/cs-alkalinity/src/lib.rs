//! cs-alkalinity: total alkalinity from titration end-point pH.
//!
//! - `species`: total sulfate/fluoride/boron and the HSO4⁻ / HF constants
//! - `ta`: the closed-form forward model and its two Newton inverses
//! - `partials`: analytic sensitivities and TA uncertainty propagation
//! - `acid_cal`: acid strength calibration against a certified reference

pub mod acid_cal;
pub mod error;
pub mod partials;
pub mod species;
pub mod ta;

pub use acid_cal::{
    AcidCalibrator, AcidStrength, CalibrationConfig, CalibrationMeasurement, CrmCalibration,
};
pub use error::{AlkalinityError, AlkalinityResult};
pub use partials::{TaBudget, TaPartials, TaUncertainty, ta_budget, ta_from_ph_correlated, ta_with_inputs};
pub use species::SpeciesConstants;
pub use ta::{AlkalinityModel, TitrationSample, acid_mass_from_ph_ta, ph_from_ta, ta_from_ph};

/// mol/kg to µmol/kg.
pub const MICRO: f64 = 1e6;
