//! Spectral decomposition errors.

use crate::mixture::MixtureParameters;
use cs_core::CsError;
use cs_solver::SolverError;
use thiserror::Error;

/// Result type for spectral operations.
pub type SpectraResult<T> = Result<T, SpectraError>;

/// Errors that can occur while validating or decomposing a spectrum.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpectraError {
    /// Malformed spectrum or weights, rejected before any numerical work.
    #[error("Invalid spectrum: {what}")]
    InvalidSpectrum { what: String },

    /// Reference spectrum queried outside the range it was fitted over.
    #[error("Wavelength {wavelength} nm outside reference domain [{lo}, {hi}]")]
    OutOfDomain { wavelength: f64, lo: f64, hi: f64 },

    /// Iteration budget exhausted; carries the last iterate.
    #[error("Mixture fit did not converge (cost={cost:e}): {what}")]
    DidNotConverge {
        what: String,
        last: MixtureParameters,
        cost: f64,
    },

    /// JᵗJ is not invertible at the optimum; the point estimate is still reported.
    #[error("Covariance is singular at the optimum: {what}")]
    SingularCovariance {
        what: String,
        params: MixtureParameters,
    },

    #[error("Solver error: {0}")]
    Solver(SolverError),

    #[error(transparent)]
    Core(#[from] CsError),
}

impl From<SolverError> for SpectraError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::ConvergenceFailed {
                what,
                last_iterate,
                residual,
            } if last_iterate.len() == 5 => SpectraError::DidNotConverge {
                what,
                last: MixtureParameters::from_slice(&last_iterate),
                cost: residual,
            },
            SolverError::Model(CsError::InvalidInput { what }) => {
                SpectraError::InvalidSpectrum { what }
            }
            other => SpectraError::Solver(other),
        }
    }
}

impl From<SpectraError> for CsError {
    fn from(err: SpectraError) -> Self {
        match err {
            SpectraError::InvalidSpectrum { what } => CsError::InvalidInput { what },
            e @ SpectraError::OutOfDomain { .. } => CsError::InvalidInput {
                what: e.to_string(),
            },
            SpectraError::DidNotConverge { what, last, cost } => CsError::DidNotConverge {
                what,
                last_iterate: last.to_array().to_vec(),
                residual: cost,
            },
            SpectraError::SingularCovariance { what, .. } => CsError::SingularCovariance { what },
            SpectraError::Solver(e) => e.into(),
            SpectraError::Core(e) => e,
        }
    }
}
