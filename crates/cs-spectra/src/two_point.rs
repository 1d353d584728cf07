//! Two-point (peak ratio) method.
//!
//! Instead of fitting the whole spectrum, read the smoothed absorbance at the
//! acid peak, the base peak and a background wavelength, and form
//! `R = (A_base − A_bkg) / (A_acid − A_bkg)`.

use crate::error::{SpectraError, SpectraResult};
use crate::spectrum::Spectrum;
use cs_core::{CorrelatedValue, UncertaintyBasis};

/// Half-width (nm) of the search window around each nominal peak.
pub const DEFAULT_PEAK_WINDOW: f64 = 30.0;

/// Running-mean width in samples.
pub const DEFAULT_SMOOTH_WINDOW: usize = 21;

/// Nominal acid, base and background wavelengths (nm) for a dye.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakLocations {
    pub acid: f64,
    pub base: f64,
    pub background: f64,
}

/// Smoothed absorbance at one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub absorbance: f64,
    /// Standard error of the smoothed absorbance
    pub stderr: f64,
    /// Wavelength the value was read at
    pub wavelength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPointPeaks {
    pub acid: Peak,
    pub base: Peak,
    pub background: Peak,
}

/// Centred running mean and its standard error.
///
/// Even windows are widened by one. Near the ends the window is truncated
/// to the samples available, so the output has the input's length.
pub fn smooth(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let window = if window % 2 == 0 { window + 1 } else { window };
    let half = window / 2;
    let n = values.len();

    (0..n)
        .map(|i| {
            let slice = &values[i.saturating_sub(half)..(i + half + 1).min(n)];
            let len = slice.len() as f64;
            let mean = slice.iter().sum::<f64>() / len;
            let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / len;
            (mean, var.sqrt() / len.sqrt())
        })
        .unzip()
}

/// Locate the acid, base and background readings in `spectrum`.
///
/// Acid and base take the smoothed maximum within `peak_window` nm of the
/// nominal location; if that maximum sits at the edge of the window (no
/// real peak inside) the sample nearest the nominal location is used
/// instead. Background is always the sample nearest its nominal location.
pub fn find_peaks(
    spectrum: &Spectrum,
    locations: &PeakLocations,
    peak_window: f64,
    smooth_window: usize,
) -> SpectraResult<TwoPointPeaks> {
    let (lo, hi) = spectrum.range();
    for (name, loc) in [
        ("acid", locations.acid),
        ("base", locations.base),
        ("background", locations.background),
    ] {
        if loc < lo || loc > hi {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("{name} location {loc} nm outside spectrum [{lo}, {hi}]"),
            });
        }
    }

    let (mean, stderr) = smooth(spectrum.absorbance(), smooth_window);
    let wv = spectrum.wavelength();
    let read = |i: usize| Peak {
        absorbance: mean[i],
        stderr: stderr[i],
        wavelength: wv[i],
    };

    let nearest = |loc: f64| -> usize {
        wv.iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(bi, bd), (i, &w)| {
                let d = (w - loc).abs();
                if d < bd { (i, d) } else { (bi, bd) }
            })
            .0
    };

    let peak_near = |loc: f64| -> usize {
        let best = wv
            .iter()
            .enumerate()
            .filter(|(_, w)| (**w - loc).abs() <= peak_window)
            .fold(None, |best: Option<usize>, (i, _)| match best {
                Some(b) if mean[b] >= mean[i] => Some(b),
                _ => Some(i),
            });
        match best {
            Some(i) if (wv[i] - loc).abs() < 0.95 * peak_window => i,
            _ => nearest(loc),
        }
    };

    Ok(TwoPointPeaks {
        acid: read(peak_near(locations.acid)),
        base: read(peak_near(locations.base)),
        background: read(nearest(locations.background)),
    })
}

/// Background-corrected base/acid ratio with the three readings treated as
/// independent uncertain parameters.
pub fn ratio_from_peaks(peaks: &TwoPointPeaks) -> SpectraResult<CorrelatedValue> {
    let basis = UncertaintyBasis::independent(
        &["acid", "base", "background"],
        &[peaks.acid.stderr, peaks.base.stderr, peaks.background.stderr],
    )?;
    let acid = basis.variable(0, peaks.acid.absorbance)?;
    let base = basis.variable(1, peaks.base.absorbance)?;
    let bkg = basis.variable(2, peaks.background.absorbance)?;

    let denominator = &acid - &bkg;
    if denominator.nominal() == 0.0 {
        return Err(SpectraError::InvalidSpectrum {
            what: "acid peak equals background".to_string(),
        });
    }
    Ok((&base - &bkg) / denominator)
}
