//! Finite-difference derivatives, used to audit analytic Jacobians.
//!
//! Every analytic derivative in carbspec is derived by hand; these helpers
//! give an independent estimate to compare against.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};

/// Step used for a central difference at `x`.
fn step_for(x: f64, epsilon: f64) -> f64 {
    epsilon * x.abs().max(1.0)
}

/// Central-difference derivative of a scalar function.
pub fn central_difference<F>(f: F, x: f64, epsilon: f64) -> SolverResult<f64>
where
    F: Fn(f64) -> SolverResult<f64>,
{
    let h = step_for(x, epsilon);
    Ok((f(x + h)? - f(x - h)?) / (2.0 * h))
}

/// Central-difference Jacobian of a vector function: one column per variable.
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let mut columns = Vec::with_capacity(x.len());
    for j in 0..x.len() {
        let h = step_for(x[j], epsilon);

        let mut x_plus = x.clone();
        x_plus[j] += h;
        let mut x_minus = x.clone();
        x_minus[j] -= h;

        columns.push((f(&x_plus)? - f(&x_minus)?) / (2.0 * h));
    }
    Ok(DMatrix::from_columns(&columns))
}

/// Largest element-wise deviation between two Jacobians, relative to the
/// magnitude of the corresponding column of `reference` (floored at `floor`).
pub fn max_column_relative_error(
    candidate: &DMatrix<f64>,
    reference: &DMatrix<f64>,
    floor: f64,
) -> SolverResult<f64> {
    if candidate.shape() != reference.shape() {
        return Err(SolverError::ProblemSetup {
            what: format!(
                "Jacobian shapes differ: {:?} vs {:?}",
                candidate.shape(),
                reference.shape()
            ),
        });
    }
    let mut worst: f64 = 0.0;
    for (c, r) in candidate.column_iter().zip(reference.column_iter()) {
        let scale = r.amax().max(floor);
        worst = worst.max((c - r).amax() / scale);
    }
    Ok(worst)
}
