use thiserror::Error;

pub type CsResult<T> = Result<T, CsError>;

/// Error taxonomy shared by every carbspec crate.
///
/// Crate-local errors convert into one of these so callers can decide
/// between retrying with new inputs and aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CsError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    #[error("Did not converge: {what} (residual={residual:e})")]
    DidNotConverge {
        what: String,
        last_iterate: Vec<f64>,
        residual: f64,
    },

    #[error("Singular covariance: {what}")]
    SingularCovariance { what: String },

    #[error("Chemically implausible result for {what}: {value}")]
    ChemicallyImplausible { what: &'static str, value: f64 },
}
