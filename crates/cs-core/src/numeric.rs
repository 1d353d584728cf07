use crate::CsError;

/// `v` if it is finite, `NonFinite` otherwise.
pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, CsError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CsError::NonFinite { what, value: v })
    }
}

/// `v` if it is finite and strictly positive.
pub fn ensure_positive(v: f64, what: &'static str) -> Result<f64, CsError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CsError::InvalidInput {
            what: format!("{what} must be positive, got {v}"),
        })
    }
}

/// Evaluate a polynomial with coefficients ordered highest degree first.
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(f64::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_positive_rejects_zero() {
        assert!(ensure_positive(0.0, "mass").is_err());
        assert_eq!(ensure_positive(2.5, "mass").unwrap(), 2.5);
    }

    #[test]
    fn polyval_highest_degree_first() {
        // 2x^2 - 3x + 1 at x = 2
        assert_eq!(polyval(&[2.0, -3.0, 1.0], 2.0), 3.0);
        assert_eq!(polyval(&[0.1], 123.0), 0.1);
        assert_eq!(polyval(&[], 5.0), 0.0);
    }
}
