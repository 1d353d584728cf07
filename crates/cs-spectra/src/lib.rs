//! cs-spectra: spectral decomposition of indicator-dye absorbance.
//!
//! Provides:
//! - `Spectrum`: validated (wavelength, absorbance) pairs
//! - `ReferenceSpectrum`: value + derivative capability for the pure acid and
//!   base dye forms, with a natural cubic spline provider
//! - the five-parameter mixture model and its analytic Jacobian
//! - `SpectralMixtureFitter`: bounded, robust least-squares decomposition
//!   returning parameters together with their covariance
//! - photometric noise, raw-channel absorbance and the two-point peak method
//!
//! # Example
//!
//! ```no_run
//! use cs_spectra::{CubicSpline, Spectrum, SpectralMixtureFitter};
//!
//! # fn load() -> (CubicSpline, CubicSpline, Spectrum) { unimplemented!() }
//! let (acid, base, spectrum) = load();
//! let fit = SpectralMixtureFitter::default()
//!     .fit(&spectrum, &acid, &base, None)
//!     .unwrap();
//! println!("F = {}", fit.params.b / fit.params.a);
//! ```

pub mod channels;
pub mod error;
pub mod fit;
pub mod mixture;
pub mod noise;
pub mod reference;
pub mod spectrum;
pub mod spline;
pub mod two_point;

// Re-exports for ergonomics
pub use channels::RawChannels;
pub use error::{SpectraError, SpectraResult};
pub use fit::{CorrelatedMixture, FitConfig, MixtureFit, SpectralMixtureFitter};
pub use mixture::{MixtureParameters, initial_guess, synthesize, synthesize_from_ph};
pub use noise::PhotometricNoise;
pub use reference::ReferenceSpectrum;
pub use spectrum::Spectrum;
pub use spline::CubicSpline;
pub use two_point::{Peak, PeakLocations, TwoPointPeaks, find_peaks, ratio_from_peaks, smooth};
