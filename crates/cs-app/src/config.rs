//! Engine configuration.

use cs_alkalinity::{CalibrationConfig, TaUncertainty};
use cs_dye::{Dye, KCalibration};
use cs_spectra::{FitConfig, PhotometricNoise};

/// Everything the measurement pipeline needs besides the reference spectra.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub dye: Dye,
    pub calibration: KCalibration,
    pub fit: FitConfig,
    /// Weights fits of measurements that carry no explicit `sigma`
    pub noise: Option<PhotometricNoise>,
    pub ta_uncertainty: TaUncertainty,
    pub acid_calibration: CalibrationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_dye(Dye::Bpb)
    }
}

impl EngineConfig {
    pub fn for_dye(dye: Dye) -> Self {
        Self {
            dye,
            calibration: KCalibration::default(),
            fit: FitConfig::default(),
            noise: None,
            ta_uncertainty: TaUncertainty::default(),
            acid_calibration: CalibrationConfig::default(),
        }
    }
}
