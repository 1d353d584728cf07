//! First-order propagation of correlated uncertainty.
//!
//! A [`CorrelatedValue`] is a nominal value plus its gradient with respect to
//! an ordered set of uncertain parameters (an [`UncertaintyBasis`]). Every
//! arithmetic operation applies the chain rule to the gradient, so the
//! variance of any derived quantity is `g · Σ · gᵗ` with `Σ` the covariance
//! of the basis parameters.
//!
//! Values combine only when they share a basis (or when one side is exact).
//! The arithmetic operators panic on values from unrelated bases; the
//! `checked_*` methods return an error instead. [`CorrelatedValue::lift`]
//! moves a value onto any basis grown from its own by
//! [`UncertaintyBasis::extend`].
//!
//! ```
//! use cs_core::correlated_values;
//! use nalgebra::DMatrix;
//!
//! let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
//! let v = correlated_values(&["a", "b"], &[2.0, 3.0], cov).unwrap();
//! let ratio = &v[1] / &v[0];
//! assert!((ratio.nominal() - 1.5).abs() < 1e-12);
//! assert!(ratio.std_dev() > 0.0);
//! ```

use crate::units::constants::LN_10;
use crate::{CsError, CsResult};
use nalgebra::{DMatrix, DVector};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

/// Ordered set of uncertain parameters and their covariance.
#[derive(Debug)]
pub struct UncertaintyBasis {
    names: Vec<String>,
    covariance: DMatrix<f64>,
    /// Basis this one was extended from; its parameters occupy the leading slots.
    prefix: Option<Arc<UncertaintyBasis>>,
}

impl UncertaintyBasis {
    /// Create a basis from parameter names and a symmetric positive-semi-definite covariance.
    pub fn new(names: Vec<String>, covariance: DMatrix<f64>) -> CsResult<Arc<Self>> {
        validate_covariance(names.len(), &covariance)?;
        Ok(Arc::new(Self {
            names,
            covariance,
            prefix: None,
        }))
    }

    /// Create a basis of mutually independent parameters from their standard deviations.
    pub fn independent(names: &[&str], std_devs: &[f64]) -> CsResult<Arc<Self>> {
        if names.len() != std_devs.len() {
            return Err(CsError::InvalidInput {
                what: format!(
                    "{} names for {} standard deviations",
                    names.len(),
                    std_devs.len()
                ),
            });
        }
        let variances = DVector::from_iterator(std_devs.len(), std_devs.iter().map(|s| s * s));
        Self::new(
            names.iter().map(|n| n.to_string()).collect(),
            DMatrix::from_diagonal(&variances),
        )
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// The value of parameter `index`, carrying a unit gradient in its own slot.
    pub fn variable(self: &Arc<Self>, index: usize, nominal: f64) -> CsResult<CorrelatedValue> {
        if index >= self.len() {
            return Err(CsError::InvalidInput {
                what: format!("basis index {index} out of range (len={})", self.len()),
            });
        }
        let mut gradient = DVector::zeros(self.len());
        gradient[index] = 1.0;
        Ok(CorrelatedValue {
            nominal,
            gradient,
            basis: Some(Arc::clone(self)),
        })
    }

    /// Append independent parameters, returning a block-diagonal basis.
    ///
    /// Values expressed on `self` can be moved onto the result with
    /// [`CorrelatedValue::lift`].
    pub fn extend_independent(self: &Arc<Self>, extra: &[(&str, f64)]) -> CsResult<Arc<Self>> {
        let names: Vec<&str> = extra.iter().map(|(name, _)| *name).collect();
        let variances = DVector::from_iterator(extra.len(), extra.iter().map(|(_, sd)| sd * sd));
        self.extend(&names, &DMatrix::from_diagonal(&variances))
    }

    /// Append a block of parameters correlated among themselves but
    /// independent of the existing ones.
    pub fn extend(self: &Arc<Self>, names: &[&str], block: &DMatrix<f64>) -> CsResult<Arc<Self>> {
        let n = self.len();
        let total = n + names.len();
        if block.nrows() != names.len() || block.ncols() != names.len() {
            return Err(CsError::InvalidInput {
                what: format!(
                    "{} new parameters but a {}x{} covariance block",
                    names.len(),
                    block.nrows(),
                    block.ncols()
                ),
            });
        }
        let mut covariance = DMatrix::zeros(total, total);
        covariance.view_mut((0, 0), (n, n)).copy_from(&self.covariance);
        covariance.view_mut((n, n), (names.len(), names.len())).copy_from(block);
        validate_covariance(total, &covariance)?;

        let mut all_names = self.names.clone();
        all_names.extend(names.iter().map(|name| name.to_string()));
        Ok(Arc::new(Self {
            names: all_names,
            covariance,
            prefix: Some(Arc::clone(self)),
        }))
    }

    /// Whether `self` is `ancestor` or was grown from it by `extend`.
    pub fn extends(&self, ancestor: &Arc<UncertaintyBasis>) -> bool {
        let mut current = self;
        loop {
            if std::ptr::eq(current, Arc::as_ptr(ancestor)) {
                return true;
            }
            match &current.prefix {
                Some(prefix) => current = &**prefix,
                None => return false,
            }
        }
    }
}

fn validate_covariance(n: usize, covariance: &DMatrix<f64>) -> CsResult<()> {
    if covariance.nrows() != n || covariance.ncols() != n {
        return Err(CsError::InvalidInput {
            what: format!(
                "covariance is {}x{}, expected {n}x{n}",
                covariance.nrows(),
                covariance.ncols()
            ),
        });
    }
    for i in 0..n {
        if !(covariance[(i, i)] >= 0.0) {
            return Err(CsError::InvalidInput {
                what: format!("covariance diagonal {i} is {}", covariance[(i, i)]),
            });
        }
        for j in 0..i {
            let (a, b) = (covariance[(i, j)], covariance[(j, i)]);
            if !a.is_finite() || !b.is_finite() {
                return Err(CsError::InvalidInput {
                    what: format!("covariance entry ({i},{j}) is not finite"),
                });
            }
            if (a - b).abs() > 1e-9 * a.abs().max(b.abs()).max(f64::MIN_POSITIVE) {
                return Err(CsError::InvalidInput {
                    what: format!("covariance is not symmetric at ({i},{j})"),
                });
            }
        }
    }
    Ok(())
}

/// Build one correlated value per parameter from nominal values and their covariance.
pub fn correlated_values(
    names: &[&str],
    nominal: &[f64],
    covariance: DMatrix<f64>,
) -> CsResult<Vec<CorrelatedValue>> {
    if names.len() != nominal.len() {
        return Err(CsError::InvalidInput {
            what: format!("{} names for {} values", names.len(), nominal.len()),
        });
    }
    let basis = UncertaintyBasis::new(names.iter().map(|n| n.to_string()).collect(), covariance)?;
    nominal
        .iter()
        .enumerate()
        .map(|(i, &v)| basis.variable(i, v))
        .collect()
}

/// A scalar with a linear sensitivity to a shared set of uncertain parameters.
///
/// # Panics
///
/// `+ - * /` between two uncertain values on different bases panic. Use
/// `checked_add` and friends when the bases are not known to match.
#[derive(Debug, Clone)]
pub struct CorrelatedValue {
    nominal: f64,
    gradient: DVector<f64>,
    /// `None` for exact constants.
    basis: Option<Arc<UncertaintyBasis>>,
}

impl CorrelatedValue {
    /// An exact value with no uncertainty.
    pub fn constant(nominal: f64) -> Self {
        Self {
            nominal,
            gradient: DVector::zeros(0),
            basis: None,
        }
    }

    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    /// Sensitivity to each basis parameter (empty for constants).
    pub fn gradient(&self) -> &DVector<f64> {
        &self.gradient
    }

    pub fn basis(&self) -> Option<&Arc<UncertaintyBasis>> {
        self.basis.as_ref()
    }

    pub fn is_exact(&self) -> bool {
        self.basis.is_none()
    }

    pub fn variance(&self) -> f64 {
        match &self.basis {
            None => 0.0,
            Some(basis) => (self.gradient.transpose() * basis.covariance() * &self.gradient)[(0, 0)]
                .max(0.0),
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Covariance between two values expressed on the same basis.
    ///
    /// Fails with `InvalidInput` when both values carry uncertainty on
    /// unrelated bases.
    pub fn covariance_with(&self, other: &Self) -> CsResult<f64> {
        match (&self.basis, &other.basis) {
            (Some(a), Some(b)) => {
                check_same_basis(a, b)?;
                Ok((self.gradient.transpose() * a.covariance() * &other.gradient)[(0, 0)])
            }
            _ => Ok(0.0),
        }
    }

    /// Re-express this value on `extended`, a basis grown from the value's own
    /// by one or more [`UncertaintyBasis::extend`] calls. The new parameters get
    /// zero sensitivity.
    ///
    /// Fails with `InvalidInput` when `extended` does not descend from this
    /// value's basis.
    pub fn lift(&self, extended: &Arc<UncertaintyBasis>) -> CsResult<Self> {
        let mut gradient = DVector::zeros(extended.len());
        match &self.basis {
            None => {}
            Some(own) if Arc::ptr_eq(own, extended) => return Ok(self.clone()),
            Some(own) => {
                if !extended.extends(own) {
                    return Err(CsError::InvalidInput {
                        what: "target basis does not extend this value's basis".to_string(),
                    });
                }
                gradient.rows_mut(0, own.len()).copy_from(&self.gradient);
            }
        }
        Ok(Self {
            nominal: self.nominal,
            gradient,
            basis: Some(Arc::clone(extended)),
        })
    }

    /// Apply a scalar function given its value and slope at the nominal point.
    pub fn map(&self, value: f64, slope: f64) -> Self {
        Self {
            nominal: value,
            gradient: &self.gradient * slope,
            basis: self.basis.clone(),
        }
    }

    pub fn ln(&self) -> Self {
        self.map(self.nominal.ln(), 1.0 / self.nominal)
    }

    pub fn log10(&self) -> Self {
        self.map(self.nominal.log10(), 1.0 / (self.nominal * LN_10))
    }

    /// `10^self`
    pub fn exp10(&self) -> Self {
        let v = 10f64.powf(self.nominal);
        self.map(v, v * LN_10)
    }

    pub fn powf(&self, p: f64) -> Self {
        self.map(self.nominal.powf(p), p * self.nominal.powf(p - 1.0))
    }

    pub fn sqrt(&self) -> Self {
        let v = self.nominal.sqrt();
        self.map(v, 0.5 / v)
    }

    pub fn recip(&self) -> Self {
        self.map(1.0 / self.nominal, -1.0 / (self.nominal * self.nominal))
    }

    pub fn checked_add(&self, rhs: &Self) -> CsResult<Self> {
        self.try_combine(rhs, self.nominal + rhs.nominal, 1.0, 1.0)
    }

    pub fn checked_sub(&self, rhs: &Self) -> CsResult<Self> {
        self.try_combine(rhs, self.nominal - rhs.nominal, 1.0, -1.0)
    }

    pub fn checked_mul(&self, rhs: &Self) -> CsResult<Self> {
        self.try_combine(rhs, self.nominal * rhs.nominal, rhs.nominal, self.nominal)
    }

    pub fn checked_div(&self, rhs: &Self) -> CsResult<Self> {
        let q = self.nominal / rhs.nominal;
        self.try_combine(rhs, q, 1.0 / rhs.nominal, -q / rhs.nominal)
    }

    /// Linear combination `da·self + db·other` with nominal `value`.
    fn try_combine(&self, other: &Self, value: f64, da: f64, db: f64) -> CsResult<Self> {
        match (&self.basis, &other.basis) {
            (None, None) => Ok(Self::constant(value)),
            (Some(_), None) => Ok(self.map(value, da)),
            (None, Some(_)) => Ok(other.map(value, db)),
            (Some(a), Some(b)) => {
                check_same_basis(a, b)?;
                Ok(Self {
                    nominal: value,
                    gradient: &self.gradient * da + &other.gradient * db,
                    basis: Some(Arc::clone(a)),
                })
            }
        }
    }
}

fn check_same_basis(a: &Arc<UncertaintyBasis>, b: &Arc<UncertaintyBasis>) -> CsResult<()> {
    if Arc::ptr_eq(a, b) {
        Ok(())
    } else {
        Err(CsError::InvalidInput {
            what: "correlated values belong to different uncertainty bases".to_string(),
        })
    }
}

/// Operator form of the `checked_*` methods.
///
/// # Panics
///
/// If both operands carry uncertainty on different bases.
fn expect_same_basis(result: CsResult<CorrelatedValue>) -> CorrelatedValue {
    match result {
        Ok(v) => v,
        Err(err) => panic!("{err}"),
    }
}

impl From<f64> for CorrelatedValue {
    fn from(v: f64) -> Self {
        Self::constant(v)
    }
}

impl Neg for &CorrelatedValue {
    type Output = CorrelatedValue;
    fn neg(self) -> CorrelatedValue {
        self.map(-self.nominal, -1.0)
    }
}

impl Neg for CorrelatedValue {
    type Output = CorrelatedValue;
    fn neg(self) -> CorrelatedValue {
        -&self
    }
}

impl Add<&CorrelatedValue> for &CorrelatedValue {
    type Output = CorrelatedValue;
    fn add(self, rhs: &CorrelatedValue) -> CorrelatedValue {
        expect_same_basis(self.checked_add(rhs))
    }
}

impl Sub<&CorrelatedValue> for &CorrelatedValue {
    type Output = CorrelatedValue;
    fn sub(self, rhs: &CorrelatedValue) -> CorrelatedValue {
        expect_same_basis(self.checked_sub(rhs))
    }
}

impl Mul<&CorrelatedValue> for &CorrelatedValue {
    type Output = CorrelatedValue;
    fn mul(self, rhs: &CorrelatedValue) -> CorrelatedValue {
        expect_same_basis(self.checked_mul(rhs))
    }
}

impl Div<&CorrelatedValue> for &CorrelatedValue {
    type Output = CorrelatedValue;
    fn div(self, rhs: &CorrelatedValue) -> CorrelatedValue {
        expect_same_basis(self.checked_div(rhs))
    }
}

// Owned and scalar forms all route through the reference impls above.
macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<CorrelatedValue> for CorrelatedValue {
            type Output = CorrelatedValue;
            fn $method(self, rhs: CorrelatedValue) -> CorrelatedValue {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&CorrelatedValue> for CorrelatedValue {
            type Output = CorrelatedValue;
            fn $method(self, rhs: &CorrelatedValue) -> CorrelatedValue {
                (&self).$method(rhs)
            }
        }

        impl $trait<CorrelatedValue> for &CorrelatedValue {
            type Output = CorrelatedValue;
            fn $method(self, rhs: CorrelatedValue) -> CorrelatedValue {
                self.$method(&rhs)
            }
        }

        impl $trait<f64> for &CorrelatedValue {
            type Output = CorrelatedValue;
            fn $method(self, rhs: f64) -> CorrelatedValue {
                self.$method(&CorrelatedValue::constant(rhs))
            }
        }

        impl $trait<f64> for CorrelatedValue {
            type Output = CorrelatedValue;
            fn $method(self, rhs: f64) -> CorrelatedValue {
                (&self).$method(&CorrelatedValue::constant(rhs))
            }
        }

        impl $trait<&CorrelatedValue> for f64 {
            type Output = CorrelatedValue;
            fn $method(self, rhs: &CorrelatedValue) -> CorrelatedValue {
                (&CorrelatedValue::constant(self)).$method(rhs)
            }
        }

        impl $trait<CorrelatedValue> for f64 {
            type Output = CorrelatedValue;
            fn $method(self, rhs: CorrelatedValue) -> CorrelatedValue {
                (&CorrelatedValue::constant(self)).$method(&rhs)
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);
forward_binop!(Div, div);

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Vec<CorrelatedValue> {
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.006, 0.006, 0.09]);
        correlated_values(&["x", "y"], &[2.0, 3.0], cov).unwrap()
    }

    #[test]
    fn ratio_variance_matches_hand_derivation() {
        let v = pair();
        let (x, y) = (&v[0], &v[1]);
        let q = y / x;
        // q = y/x: dq/dx = -y/x², dq/dy = 1/x
        let gx = -3.0 / 4.0;
        let gy = 1.0 / 2.0;
        let expected = gx * gx * 0.04 + gy * gy * 0.09 + 2.0 * gx * gy * 0.006;
        assert!((q.nominal() - 1.5).abs() < 1e-15);
        assert!((q.variance() - expected).abs() < 1e-15);
    }

    #[test]
    fn log10_and_exp10_are_inverse() {
        let v = pair();
        let back = v[0].log10().exp10();
        assert!((back.nominal() - 2.0).abs() < 1e-12);
        assert!((back.std_dev() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn perfectly_correlated_difference_cancels() {
        let v = pair();
        let d = &v[0] - &v[0];
        assert_eq!(d.nominal(), 0.0);
        assert!(d.variance() < 1e-30);
    }

    #[test]
    fn constants_carry_no_uncertainty() {
        let c = CorrelatedValue::constant(4.0);
        let r = (&c * 2.0 + 1.0).ln();
        assert!(r.is_exact());
        assert_eq!(r.variance(), 0.0);
        assert!((r.nominal() - 9f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn scalar_ops_scale_gradient() {
        let v = pair();
        let s = 10.0 - &v[1] * 2.0;
        assert!((s.nominal() - 4.0).abs() < 1e-15);
        assert!((s.std_dev() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn lift_onto_extended_basis() {
        let v = pair();
        let basis = v[0].basis().unwrap();
        let extended = basis.extend_independent(&[("z", 0.5)]).unwrap();
        let z = extended.variable(2, 1.0).unwrap();
        let x = v[0].lift(&extended).unwrap();
        let sum = &x + &z;
        assert!((sum.variance() - (0.04 + 0.25)).abs() < 1e-12);
    }

    #[test]
    fn extend_with_correlated_block() {
        let v = pair();
        let block = DMatrix::from_row_slice(2, 2, &[1.0, -0.5, -0.5, 1.0]);
        let extended = v[0].basis().unwrap().extend(&["p", "q"], &block).unwrap();
        assert_eq!(extended.len(), 4);
        let p = extended.variable(2, 0.0).unwrap();
        let q = extended.variable(3, 0.0).unwrap();
        // var(p + q) = 1 + 1 − 2·0.5
        assert!(((&p + &q).variance() - 1.0).abs() < 1e-12);
        assert_eq!(v[1].lift(&extended).unwrap().covariance_with(&p).unwrap(), 0.0);
        assert!(extended.extend(&["r"], &block).is_err());
    }

    #[test]
    fn lift_rejects_unrelated_basis() {
        let v = pair();
        let other = UncertaintyBasis::independent(&["q"], &[1.0]).unwrap();
        assert!(matches!(v[0].lift(&other), Err(CsError::InvalidInput { .. })));
        // A basis extended from a different one is still unrelated.
        let grown = other.extend_independent(&[("r", 1.0)]).unwrap();
        assert!(v[0].lift(&grown).is_err());
    }

    #[test]
    fn lift_through_repeated_extension() {
        let v = pair();
        let once = v[0].basis().unwrap().extend_independent(&[("z", 0.5)]).unwrap();
        let twice = once.extend_independent(&[("w", 2.0)]).unwrap();
        assert!(twice.extends(v[0].basis().unwrap()));
        let w = twice.variable(3, 0.0).unwrap();
        let x = v[0].lift(&twice).unwrap();
        assert_eq!(x.gradient().len(), 4);
        assert!(((&x + &w).variance() - (0.04 + 4.0)).abs() < 1e-12);
    }

    #[test]
    fn checked_ops_reject_unrelated_bases() {
        let a = pair();
        let b = pair();
        assert!(matches!(a[0].checked_add(&b[0]), Err(CsError::InvalidInput { .. })));
        assert!(a[0].checked_div(&b[1]).is_err());
        assert!(a[0].covariance_with(&b[0]).is_err());
        let q = a[1].checked_div(&a[0]).unwrap();
        assert!((q.nominal() - 1.5).abs() < 1e-15);
        // Exact values combine with anything.
        assert!(a[0].checked_mul(&CorrelatedValue::constant(2.0)).is_ok());
    }

    #[test]
    fn rejects_asymmetric_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.1, 1.0]);
        assert!(correlated_values(&["a", "b"], &[0.0, 0.0], cov).is_err());
    }

    #[test]
    #[should_panic(expected = "different uncertainty bases")]
    fn mixing_bases_panics() {
        let a = pair();
        let b = pair();
        let _ = &a[0] + &b[0];
    }
}
