//! Photometric noise of a dual-beam absorbance measurement.
//!
//! Three transmittance noise sources (Galbán et al. 2007): thermal
//! (detector) noise, photon shot noise and cell-positioning noise. Their
//! quadrature sum is converted into an absorbance standard deviation with
//! `σ_A = log10(e) · σ_T / T`.

use crate::error::{SpectraError, SpectraResult};
use crate::spectrum::Spectrum;
use std::f64::consts::LOG10_E;

/// Noise coefficients; any may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhotometricNoise {
    /// Thermal noise coefficient
    pub k1: f64,
    /// Photon shot-noise coefficient
    pub k2: f64,
    /// Cell-positioning noise coefficient
    pub k3: f64,
}

impl PhotometricNoise {
    pub fn new(k1: f64, k2: f64, k3: f64) -> Self {
        Self { k1, k2, k3 }
    }

    pub fn thermal(&self, absorbance: f64) -> f64 {
        self.k1 * (1.0 + 10f64.powf(-2.0 * absorbance)).sqrt()
    }

    pub fn photon(&self, absorbance: f64) -> f64 {
        self.k2 * (10f64.powf(-absorbance) + 10f64.powf(-2.0 * absorbance)).sqrt()
    }

    pub fn cell_position(&self, absorbance: f64) -> f64 {
        self.k3 * 10f64.powf(-absorbance)
    }

    /// Combined transmittance standard deviation.
    pub fn transmittance_sd(&self, absorbance: f64) -> f64 {
        let t = self.thermal(absorbance);
        let p = self.photon(absorbance);
        let c = self.cell_position(absorbance);
        (t * t + p * p + c * c).sqrt()
    }

    /// Absolute absorbance standard deviation at `absorbance`.
    pub fn absolute_error(&self, absorbance: f64) -> f64 {
        LOG10_E * self.transmittance_sd(absorbance) * 10f64.powf(absorbance)
    }

    /// Absorbance standard deviation relative to `absorbance`.
    pub fn relative_error(&self, absorbance: f64) -> f64 {
        self.absolute_error(absorbance) / absorbance
    }

    /// Per-sample standard deviation for weighting a mixture fit.
    pub fn sigma_for(&self, spectrum: &Spectrum) -> SpectraResult<Vec<f64>> {
        spectrum
            .absorbance()
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                let s = self.absolute_error(a);
                if s.is_finite() && s > 0.0 {
                    Ok(s)
                } else {
                    Err(SpectraError::InvalidSpectrum {
                        what: format!("photometric error {s} at sample {i} (A = {a})"),
                    })
                }
            })
            .collect()
    }
}
