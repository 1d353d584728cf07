//! cs-dye: indicator dye chemistry.
//!
//! - `Dye`: the closed set of supported indicator dyes
//! - equilibrium constants K(T, S) for each dye and calibration
//! - pH from the fitted fraction ratio, from a two-point absorbance ratio,
//!   and the Tris buffer reference pH

pub mod dye;
pub mod error;
pub mod ph;

pub use dye::{Dye, KCalibration, equilibrium_constant, equilibrium_constant_correlated, equilibrium_constant_on};
pub use error::{DyeError, DyeResult};
pub use ph::{fraction_ratio, ph_from_f, ph_from_fit, ph_from_ratio, tris_buffer_ph};
