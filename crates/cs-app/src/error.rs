//! Error types for the cs-app service layer.

use cs_alkalinity::AlkalinityError;
use cs_core::CsError;
use cs_dye::DyeError;
use cs_spectra::SpectraError;

/// Application error wrapping the errors of the chemistry crates.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Spectral fit failed: {0}")]
    Spectra(#[from] SpectraError),

    #[error("Dye chemistry failed: {0}")]
    Dye(#[from] DyeError),

    #[error("Alkalinity failed: {0}")]
    Alkalinity(#[from] AlkalinityError),

    #[error(transparent)]
    Core(#[from] CsError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for cs-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<AppError> for CsError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Spectra(e) => e.into(),
            AppError::Dye(e) => e.into(),
            AppError::Alkalinity(e) => e.into(),
            AppError::Core(e) => e,
            AppError::InvalidInput(what) => CsError::InvalidInput { what },
        }
    }
}
