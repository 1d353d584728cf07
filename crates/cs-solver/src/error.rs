//! Error types for solver operations.

use cs_core::error::CsError;
use thiserror::Error;

/// Errors that can occur while solving.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed {
        what: String,
        last_iterate: Vec<f64>,
        residual: f64,
    },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Model error: {0}")]
    Model(#[from] CsError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for CsError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::ProblemSetup { what } => CsError::InvalidInput { what },
            SolverError::ConvergenceFailed {
                what,
                last_iterate,
                residual,
            } => CsError::DidNotConverge {
                what,
                last_iterate,
                residual,
            },
            SolverError::Numeric { what } => CsError::DidNotConverge {
                what,
                last_iterate: Vec::new(),
                residual: f64::NAN,
            },
            SolverError::Model(inner) => inner,
        }
    }
}
