//! Natural cubic spline over tabulated molal absorption.

use crate::error::{SpectraError, SpectraResult};
use crate::reference::ReferenceSpectrum;

/// Interpolating cubic spline with zero curvature at both ends.
///
/// Stores the knots and the second derivative at each knot; segments are
/// evaluated in the standard `(A y_i + B y_{i+1} + C y''_i + D y''_{i+1})`
/// form.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural spline through `(xs, ys)`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> SpectraResult<Self> {
        if xs.len() != ys.len() {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("spline has {} knots but {} values", xs.len(), ys.len()),
            });
        }
        if xs.len() < 3 {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("spline needs at least 3 knots, got {}", xs.len()),
            });
        }
        if xs.iter().chain(&ys).any(|v| !v.is_finite()) {
            return Err(SpectraError::InvalidSpectrum {
                what: "spline knots must be finite".to_string(),
            });
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SpectraError::InvalidSpectrum {
                what: "spline knots must be strictly increasing".to_string(),
            });
        }

        let second = natural_second_derivatives(&xs, &ys);
        Ok(Self { xs, ys, second })
    }

    /// Tabulate `f` on `n` evenly spaced knots over `[lo, hi]` and fit.
    pub fn from_fn<F>(lo: f64, hi: f64, n: usize, f: F) -> SpectraResult<Self>
    where
        F: Fn(f64) -> f64,
    {
        if n < 3 || hi <= lo {
            return Err(SpectraError::InvalidSpectrum {
                what: format!("cannot tabulate {n} knots over [{lo}, {hi}]"),
            });
        }
        let step = (hi - lo) / (n - 1) as f64;
        let xs: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
        let ys = xs.iter().map(|&x| f(x)).collect();
        Self::new(xs, ys)
    }

    pub fn knots(&self) -> &[f64] {
        &self.xs
    }

    /// Index of the segment containing `x`, clamped to the end segments.
    fn segment(&self, x: f64) -> usize {
        let i = self.xs.partition_point(|&k| k <= x);
        i.saturating_sub(1).min(self.xs.len() - 2)
    }
}

/// Solve the tridiagonal system for knot curvatures (Thomas algorithm).
fn natural_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut second = vec![0.0; n];
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    for i in 1..n - 1 {
        let h0 = xs[i] - xs[i - 1];
        let h1 = xs[i + 1] - xs[i];
        let lower = h0 / 6.0;
        let diag = (h0 + h1) / 3.0;
        let upper = h1 / 6.0;
        let rhs = (ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0;

        let denom = diag - lower * c_prime[i - 1];
        c_prime[i] = upper / denom;
        d_prime[i] = (rhs - lower * d_prime[i - 1]) / denom;
    }
    for i in (1..n - 1).rev() {
        second[i] = d_prime[i] - c_prime[i] * second[i + 1];
    }
    second
}

impl ReferenceSpectrum for CubicSpline {
    fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    fn value(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a.powi(3) - a) * self.second[i] + (b.powi(3) - b) * self.second[i + 1]) * h * h
                / 6.0
    }

    fn derivative(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        (self.ys[i + 1] - self.ys[i]) / h
            + ((1.0 - 3.0 * a * a) * self.second[i] + (3.0 * b * b - 1.0) * self.second[i + 1]) * h
                / 6.0
    }
}
