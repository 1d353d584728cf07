//! Five-parameter mixture of acid and base reference spectra.
//!
//! `y(x) = bkg + a·acid(c + m·x) + b·base(c + m·x)`, where `c` and `m`
//! correct small wavelength-calibration drift between the instrument and the
//! references.

use crate::error::{SpectraError, SpectraResult};
use crate::reference::ReferenceSpectrum;
use crate::spectrum::Spectrum;
use nalgebra::{DMatrix, DVector};

/// Number of mixture parameters.
pub const N_PARAMS: usize = 5;

/// Parameter names in vector order.
pub const PARAM_NAMES: [&str; N_PARAMS] = ["a", "b", "bkg", "c", "m"];

/// Mixture coefficients in the fixed order `(a, b, bkg, c, m)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixtureParameters {
    /// Acid-form coefficient
    pub a: f64,
    /// Base-form coefficient
    pub b: f64,
    /// Constant background offset
    pub bkg: f64,
    /// Wavelength shift (nm)
    pub c: f64,
    /// Wavelength stretch
    pub m: f64,
}

impl Default for MixtureParameters {
    fn default() -> Self {
        Self {
            a: 0.0,
            b: 0.0,
            bkg: 0.0,
            c: 0.0,
            m: 1.0,
        }
    }
}

impl MixtureParameters {
    pub fn to_array(&self) -> [f64; N_PARAMS] {
        [self.a, self.b, self.bkg, self.c, self.m]
    }

    pub fn from_array(p: [f64; N_PARAMS]) -> Self {
        Self {
            a: p[0],
            b: p[1],
            bkg: p[2],
            c: p[3],
            m: p[4],
        }
    }

    /// Build from the first five elements of `p`; missing entries keep their defaults.
    pub fn from_slice(p: &[f64]) -> Self {
        let mut out = Self::default().to_array();
        for (dst, src) in out.iter_mut().zip(p) {
            *dst = *src;
        }
        Self::from_array(out)
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_row_slice(&self.to_array())
    }

    pub fn from_vector(p: &DVector<f64>) -> Self {
        Self::from_slice(p.as_slice())
    }

    /// Base-to-acid ratio `F = b / a`.
    pub fn fraction_ratio(&self) -> f64 {
        self.b / self.a
    }

    /// Wavelength on the reference axis for measured wavelength `x`.
    pub fn corrected(&self, x: f64) -> f64 {
        self.c + self.m * x
    }

    /// Model absorbance at `x` (no domain check).
    pub fn evaluate<A, B>(&self, x: f64, acid: &A, base: &B) -> f64
    where
        A: ReferenceSpectrum + ?Sized,
        B: ReferenceSpectrum + ?Sized,
    {
        let xm = self.corrected(x);
        self.bkg + self.a * acid.value(xm) + self.b * base.value(xm)
    }

    /// Analytic Jacobian of the model, one row per wavelength, columns in
    /// parameter order.
    pub fn jacobian<A, B>(&self, wavelength: &[f64], acid: &A, base: &B) -> DMatrix<f64>
    where
        A: ReferenceSpectrum + ?Sized,
        B: ReferenceSpectrum + ?Sized,
    {
        let mut jac = DMatrix::zeros(wavelength.len(), N_PARAMS);
        for (i, &x) in wavelength.iter().enumerate() {
            let xm = self.corrected(x);
            let slope = self.a * acid.derivative(xm) + self.b * base.derivative(xm);
            jac[(i, 0)] = acid.value(xm);
            jac[(i, 1)] = base.value(xm);
            jac[(i, 2)] = 1.0;
            jac[(i, 3)] = slope;
            jac[(i, 4)] = x * slope;
        }
        jac
    }

    /// Whether every corrected wavelength stays inside both reference domains.
    pub fn within_domain<A, B>(&self, wavelength: &[f64], acid: &A, base: &B) -> bool
    where
        A: ReferenceSpectrum + ?Sized,
        B: ReferenceSpectrum + ?Sized,
    {
        // c + m·x is monotone in x for m > 0, so the ends suffice
        let (Some(&first), Some(&last)) = (wavelength.first(), wavelength.last()) else {
            return true;
        };
        [first, last].iter().all(|&x| {
            let xm = self.corrected(x);
            acid.contains(xm) && base.contains(xm)
        })
    }
}

/// Starting values for the mixture fit.
///
/// `bkg` is the mean of the last `tail` samples; `b` is read at the grid
/// point where `base` peaks and `a` where `acid` peaks, after removing the
/// background and base contribution. Negative estimates are clamped to zero.
pub fn initial_guess<A, B>(
    spectrum: &Spectrum,
    acid: &A,
    base: &B,
    tail: usize,
) -> SpectraResult<MixtureParameters>
where
    A: ReferenceSpectrum + ?Sized,
    B: ReferenceSpectrum + ?Sized,
{
    let x = spectrum.wavelength();
    let y = spectrum.absorbance();

    let tail = tail.clamp(1, y.len());
    let bkg = y[y.len() - tail..].iter().sum::<f64>() / tail as f64;

    let base_at: Vec<f64> = x.iter().map(|&v| base.value(v)).collect();
    let acid_at: Vec<f64> = x.iter().map(|&v| acid.value(v)).collect();

    let base_loc = argmax(&base_at);
    if base_at[base_loc] <= 0.0 {
        return Err(SpectraError::InvalidSpectrum {
            what: "base reference has no positive absorption over the spectrum".to_string(),
        });
    }
    let b = (y[base_loc] - bkg).max(0.0) / base_at[base_loc];

    let acid_loc = argmax(&acid_at);
    if acid_at[acid_loc] <= 0.0 {
        return Err(SpectraError::InvalidSpectrum {
            what: "acid reference has no positive absorption over the spectrum".to_string(),
        });
    }
    let a = (y[acid_loc] - bkg - b * base_at[acid_loc]).max(0.0) / acid_at[acid_loc];

    Ok(MixtureParameters {
        a,
        b,
        bkg,
        c: 0.0,
        m: 1.0,
    })
}

/// First index of the largest element.
fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &x)| {
            if x > bv { (i, x) } else { (bi, bv) }
        })
        .0
}

/// Forward model over a wavelength grid. Every corrected wavelength must lie
/// inside both reference domains.
pub fn synthesize<A, B>(
    params: &MixtureParameters,
    wavelength: &[f64],
    acid: &A,
    base: &B,
) -> SpectraResult<Vec<f64>>
where
    A: ReferenceSpectrum + ?Sized,
    B: ReferenceSpectrum + ?Sized,
{
    wavelength
        .iter()
        .map(|&x| {
            let xm = params.corrected(x);
            Ok(params.bkg
                + params.a * acid.checked_value(xm)?
                + params.b * base.checked_value(xm)?)
        })
        .collect()
}

/// Spectrum of `dye_conc` total dye at `ph`, split into acid and base forms
/// by the dye dissociation constant `k`: `a = C/(1 + K/H)`, `b = C/(1 + H/K)`.
pub fn synthesize_from_ph<A, B>(
    wavelength: &[f64],
    ph: f64,
    dye_conc: f64,
    k: f64,
    acid: &A,
    base: &B,
) -> SpectraResult<Vec<f64>>
where
    A: ReferenceSpectrum + ?Sized,
    B: ReferenceSpectrum + ?Sized,
{
    if !ph.is_finite() || !dye_conc.is_finite() || !(k > 0.0) || !k.is_finite() {
        return Err(SpectraError::InvalidSpectrum {
            what: format!("cannot synthesize at pH={ph}, C={dye_conc}, K={k}"),
        });
    }
    let h = 10f64.powf(-ph);
    let params = MixtureParameters {
        a: dye_conc / (1.0 + k / h),
        b: dye_conc / (1.0 + h / k),
        ..MixtureParameters::default()
    };
    synthesize(&params, wavelength, acid, base)
}
