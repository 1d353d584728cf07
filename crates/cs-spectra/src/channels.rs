//! Absorbance from raw dual-channel intensities.

use crate::error::{SpectraError, SpectraResult};
use crate::spectrum::Spectrum;

/// Raw detector counts for one measurement.
///
/// `scale_factor` normalises the sample channel against the reference
/// channel; it is measured once on a blank with
/// [`RawChannels::scale_factor`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawChannels {
    pub wavelength: Vec<f64>,
    pub dark: Vec<f64>,
    pub scale_factor: Vec<f64>,
    pub reference_raw: Vec<f64>,
    pub sample_raw: Vec<f64>,
}

impl RawChannels {
    /// Channel ratio `sample_raw / reference_raw` recorded on a blank.
    pub fn scale_factor(sample_raw: &[f64], reference_raw: &[f64]) -> SpectraResult<Vec<f64>> {
        if sample_raw.len() != reference_raw.len() {
            return Err(SpectraError::InvalidSpectrum {
                what: format!(
                    "{} sample counts for {} reference counts",
                    sample_raw.len(),
                    reference_raw.len()
                ),
            });
        }
        sample_raw
            .iter()
            .zip(reference_raw)
            .enumerate()
            .map(|(i, (&s, &r))| {
                if r > 0.0 && s > 0.0 && (s / r).is_finite() {
                    Ok(s / r)
                } else {
                    Err(SpectraError::InvalidSpectrum {
                        what: format!("cannot form scale factor at index {i} ({s} / {r})"),
                    })
                }
            })
            .collect()
    }

    /// Dark-corrected reference intensity.
    pub fn reference(&self) -> Vec<f64> {
        self.reference_raw
            .iter()
            .zip(&self.dark)
            .map(|(r, d)| r - d)
            .collect()
    }

    /// Scaled, dark-corrected sample intensity.
    pub fn sample(&self) -> Vec<f64> {
        self.sample_raw
            .iter()
            .zip(&self.scale_factor)
            .zip(&self.dark)
            .map(|((s, f), d)| s / f - d)
            .collect()
    }

    /// `A = −log10(sample / reference)`.
    pub fn absorbance(&self) -> SpectraResult<Spectrum> {
        let n = self.wavelength.len();
        for (name, len) in [
            ("dark", self.dark.len()),
            ("scale_factor", self.scale_factor.len()),
            ("reference_raw", self.reference_raw.len()),
            ("sample_raw", self.sample_raw.len()),
        ] {
            if len != n {
                return Err(SpectraError::InvalidSpectrum {
                    what: format!("{name} has {len} values for {n} wavelengths"),
                });
            }
        }

        let reference = self.reference();
        let sample = self.sample();
        let absorbance = sample
            .iter()
            .zip(&reference)
            .enumerate()
            .map(|(i, (&s, &r))| {
                if s > 0.0 && r > 0.0 {
                    Ok(-(s / r).log10())
                } else {
                    Err(SpectraError::InvalidSpectrum {
                        what: format!(
                            "non-positive corrected intensity at {} nm (sample {s}, reference {r})",
                            self.wavelength[i]
                        ),
                    })
                }
            })
            .collect::<SpectraResult<Vec<f64>>>()?;

        Spectrum::new(self.wavelength.clone(), absorbance)
    }
}
