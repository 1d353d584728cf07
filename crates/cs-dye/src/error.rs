//! Dye model errors.

use cs_core::CsError;
use cs_spectra::SpectraError;
use thiserror::Error;

pub type DyeResult<T> = Result<T, DyeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DyeError {
    /// Identifier read from configuration that names no supported dye.
    #[error("Unknown dye '{name}' (expected one of BPB, BPB_Cam1, MCP, MCP_Cam1)")]
    UnknownDye { name: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error(transparent)]
    Spectra(#[from] SpectraError),

    #[error(transparent)]
    Core(#[from] CsError),
}

impl From<DyeError> for CsError {
    fn from(err: DyeError) -> Self {
        match err {
            e @ DyeError::UnknownDye { .. } => CsError::InvalidInput {
                what: e.to_string(),
            },
            DyeError::InvalidArg { what } => CsError::InvalidInput { what },
            DyeError::Spectra(e) => e.into(),
            DyeError::Core(e) => e,
        }
    }
}
