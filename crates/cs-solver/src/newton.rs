//! Newton solver with line search and an admissible region.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Newton solver configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: f64,
    /// Relative tolerance for residual norm
    pub rel_tol: f64,
    /// Step tolerance, relative to `1 + |x|`
    pub step_tol: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-9,
            rel_tol: 1e-12,
            step_tol: 1e-12,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct NewtonResult {
    /// Solution vector
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
}

/// Newton solver with backtracking line search.
pub fn newton_solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> SolverResult<DMatrix<f64>>,
{
    newton_solve_in(x0, residual_fn, jacobian_fn, |_| true, config)
}

/// Newton solver whose trial points must satisfy `admissible`.
///
/// Trial points outside the admissible region are backtracked towards the
/// current iterate, so the residual is never evaluated there.
pub fn newton_solve_in<F, J, A>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    admissible: A,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> SolverResult<DMatrix<f64>>,
    A: Fn(&DVector<f64>) -> bool,
{
    if !admissible(&x0) {
        return Err(SolverError::ProblemSetup {
            what: format!("Initial guess {:?} is not admissible", x0.as_slice()),
        });
    }

    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        // Check convergence
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
            debug!(iterations = iter, residual = r_norm, "newton converged on residual");
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
            });
        }

        let jac = jacobian_fn(&x)?;

        // Solve J * dx = -r
        let dx = jac
            .lu()
            .solve(&(-&r))
            .ok_or_else(|| SolverError::Numeric {
                what: format!("Jacobian solve failed at iteration {iter}"),
            })?;

        if dx.amax() <= config.step_tol * (1.0 + x.amax()) {
            let x_new = &x + &dx;
            if admissible(&x_new) {
                let r_new = residual_fn(&x_new)?;
                debug!(iterations = iter + 1, residual = r_new.norm(), "newton converged on step");
                return Ok(NewtonResult {
                    residual_norm: r_new.norm(),
                    x: x_new,
                    iterations: iter + 1,
                });
            }
        }

        // Backtrack until the trial point is admissible and reduces the residual
        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..config.max_line_search_iters {
            let x_new = &x + alpha * &dx;
            if admissible(&x_new) {
                let r_new = residual_fn(&x_new)?;
                let r_new_norm = r_new.norm();
                if r_new_norm < r_norm {
                    accepted = Some((x_new, r_new, r_new_norm));
                    break;
                }
            }
            alpha *= config.line_search_beta;
        }

        let Some((x_new, r_new, r_new_norm)) = accepted else {
            warn!(iteration = iter, residual = r_norm, "newton line search stagnated");
            return Err(SolverError::ConvergenceFailed {
                what: format!("Line search stagnated at iteration {iter}"),
                last_iterate: x.as_slice().to_vec(),
                residual: r_norm,
            });
        };

        x = x_new;
        r = r_new;
        r_norm = r_new_norm;
    }

    if r_norm < config.abs_tol {
        return Ok(NewtonResult {
            x,
            residual_norm: r_norm,
            iterations: config.max_iterations,
        });
    }

    warn!(max_iterations = config.max_iterations, residual = r_norm, "newton budget exhausted");
    Err(SolverError::ConvergenceFailed {
        what: format!(
            "Maximum iterations {} reached, residual = {}",
            config.max_iterations, r_norm
        ),
        last_iterate: x.as_slice().to_vec(),
        residual: r_norm,
    })
}

/// Scalar convenience wrapper: solve `f(x) = 0` given `f` and `f'`.
pub fn newton_scalar<F, D, A>(
    x0: f64,
    f: F,
    df: D,
    admissible: A,
    config: &NewtonConfig,
) -> SolverResult<(f64, NewtonResult)>
where
    F: Fn(f64) -> SolverResult<f64>,
    D: Fn(f64) -> SolverResult<f64>,
    A: Fn(f64) -> bool,
{
    let result = newton_solve_in(
        DVector::from_element(1, x0),
        |x| Ok(DVector::from_element(1, f(x[0])?)),
        |x| Ok(DMatrix::from_element(1, 1, df(x[0])?)),
        |x| admissible(x[0]),
        config,
    )?;
    Ok((result.x[0], result))
}
