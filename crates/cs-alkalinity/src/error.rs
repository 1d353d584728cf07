//! Alkalinity model errors.

use cs_core::CsError;
use cs_solver::SolverError;
use thiserror::Error;

pub type AlkalinityResult<T> = Result<T, AlkalinityError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlkalinityError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    /// Root finder or minimizer exhausted its budget.
    #[error("Did not converge: {what} (residual={residual:e})")]
    DidNotConverge {
        what: String,
        last_iterate: Vec<f64>,
        residual: f64,
    },

    /// Converged, but to a value outside the physically sane range.
    #[error("Chemically implausible {what}: {value}")]
    ChemicallyImplausible { what: &'static str, value: f64 },

    #[error("Solver error: {0}")]
    Solver(SolverError),

    #[error(transparent)]
    Core(CsError),
}

impl From<CsError> for AlkalinityError {
    fn from(err: CsError) -> Self {
        match err {
            CsError::InvalidInput { what } => AlkalinityError::InvalidArg { what },
            other => AlkalinityError::Core(other),
        }
    }
}

impl From<SolverError> for AlkalinityError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::ConvergenceFailed {
                what,
                last_iterate,
                residual,
            } => AlkalinityError::DidNotConverge {
                what,
                last_iterate,
                residual,
            },
            SolverError::ProblemSetup { what } => AlkalinityError::InvalidArg { what },
            SolverError::Model(e) => e.into(),
            other => AlkalinityError::Solver(other),
        }
    }
}

impl From<AlkalinityError> for CsError {
    fn from(err: AlkalinityError) -> Self {
        match err {
            AlkalinityError::InvalidArg { what } => CsError::InvalidInput { what },
            AlkalinityError::DidNotConverge {
                what,
                last_iterate,
                residual,
            } => CsError::DidNotConverge {
                what,
                last_iterate,
                residual,
            },
            AlkalinityError::ChemicallyImplausible { what, value } => {
                CsError::ChemicallyImplausible { what, value }
            }
            AlkalinityError::Solver(e) => e.into(),
            AlkalinityError::Core(e) => e,
        }
    }
}
