//! Measured absorbance spectrum.

use crate::error::{SpectraError, SpectraResult};

/// Minimum number of samples: the mixture model has five parameters and the
/// covariance needs at least one degree of freedom.
pub const MIN_SAMPLES: usize = 6;

/// Ordered (wavelength, absorbance) pairs with strictly increasing wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    absorbance: Vec<f64>,
}

impl Spectrum {
    /// Validate and build a spectrum. Wavelengths in nm.
    pub fn new(wavelength: Vec<f64>, absorbance: Vec<f64>) -> SpectraResult<Self> {
        if wavelength.len() != absorbance.len() {
            return Err(SpectraError::InvalidSpectrum {
                what: format!(
                    "{} wavelengths for {} absorbance values",
                    wavelength.len(),
                    absorbance.len()
                ),
            });
        }
        if wavelength.len() < MIN_SAMPLES {
            return Err(SpectraError::InvalidSpectrum {
                what: format!(
                    "{} samples, need at least {MIN_SAMPLES}",
                    wavelength.len()
                ),
            });
        }
        if let Some(i) = wavelength.iter().position(|v| !v.is_finite()) {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("non-finite wavelength at index {i}"),
            });
        }
        if let Some(i) = absorbance.iter().position(|v| !v.is_finite()) {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("non-finite absorbance at index {i}"),
            });
        }
        if let Some(i) = wavelength.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("wavelength not strictly increasing at index {}", i + 1),
            });
        }
        Ok(Self {
            wavelength,
            absorbance,
        })
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn absorbance(&self) -> &[f64] {
        &self.absorbance
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    /// First and last wavelength.
    pub fn range(&self) -> (f64, f64) {
        (self.wavelength[0], self.wavelength[self.wavelength.len() - 1])
    }

    /// Keep only samples with wavelength in `[lo, hi]`.
    pub fn window(&self, lo: f64, hi: f64) -> SpectraResult<Self> {
        let (wavelength, absorbance) = self
            .wavelength
            .iter()
            .zip(&self.absorbance)
            .filter(|(w, _)| **w >= lo && **w <= hi)
            .map(|(w, a)| (*w, *a))
            .unzip();
        Self::new(wavelength, absorbance)
    }
}
