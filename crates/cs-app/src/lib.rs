//! Measurement service layer for carbspec.
//!
//! Ties the chemistry crates into one pipeline (spectrum -> pH -> TA), runs
//! acid calibrations from reference-material spectra, and evaluates batches
//! of independent measurements in parallel.

pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::EngineConfig;
pub use error::{AppError, AppResult};
pub use pipeline::{
    AlkalinityOutcome, DyeReferences, Engine, Measurement, PhOutcome, Titration,
};
