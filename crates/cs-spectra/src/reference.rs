//! Reference (pure acid / pure base) molal absorption spectra.

use crate::error::{SpectraError, SpectraResult};

/// Smooth molal absorption of one dye form, queryable for value and slope.
///
/// Implementations are only valid inside [`domain`](Self::domain); callers
/// that cannot guarantee this must use the `checked_*` methods.
pub trait ReferenceSpectrum: Send + Sync {
    /// Closed wavelength interval (nm) the reference was fitted over.
    fn domain(&self) -> (f64, f64);

    /// Molal absorption at `wavelength`.
    fn value(&self, wavelength: f64) -> f64;

    /// First derivative of molal absorption with respect to wavelength.
    fn derivative(&self, wavelength: f64) -> f64;

    fn contains(&self, wavelength: f64) -> bool {
        let (lo, hi) = self.domain();
        wavelength >= lo && wavelength <= hi
    }

    fn check(&self, wavelength: f64) -> SpectraResult<()> {
        if self.contains(wavelength) {
            Ok(())
        } else {
            let (lo, hi) = self.domain();
            Err(SpectraError::OutOfDomain { wavelength, lo, hi })
        }
    }

    fn checked_value(&self, wavelength: f64) -> SpectraResult<f64> {
        self.check(wavelength)?;
        Ok(self.value(wavelength))
    }

    fn checked_derivative(&self, wavelength: f64) -> SpectraResult<f64> {
        self.check(wavelength)?;
        Ok(self.derivative(wavelength))
    }
}

impl<T: ReferenceSpectrum + ?Sized> ReferenceSpectrum for &T {
    fn domain(&self) -> (f64, f64) {
        (**self).domain()
    }

    fn value(&self, wavelength: f64) -> f64 {
        (**self).value(wavelength)
    }

    fn derivative(&self, wavelength: f64) -> f64 {
        (**self).derivative(wavelength)
    }
}

impl<T: ReferenceSpectrum + ?Sized> ReferenceSpectrum for Box<T> {
    fn domain(&self) -> (f64, f64) {
        (**self).domain()
    }

    fn value(&self, wavelength: f64) -> f64 {
        (**self).value(wavelength)
    }

    fn derivative(&self, wavelength: f64) -> f64 {
        (**self).derivative(wavelength)
    }
}
