//! Bounded nonlinear least squares with robust losses.
//!
//! Minimizes `½ Σ ρ(fᵢ(x)²)` subject to `lower ≤ x ≤ upper` with a
//! Levenberg-Marquardt trust region: each iteration solves the damped
//! Gauss-Newton system on the variables that are free to move, projects the
//! step onto the box, and accepts it only if the actual cost reduction agrees
//! with the quadratic model. Robust losses follow the usual
//! iteratively-reweighted scheme: residuals and Jacobian rows are rescaled by
//! the loss derivatives so the Gauss-Newton model matches the robust cost.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace, warn};

/// Residual model for [`least_squares`].
pub trait LeastSquaresProblem {
    /// Residual vector at `x`.
    fn residuals(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>>;

    /// Jacobian of the residuals at `x` (rows = residuals, columns = variables).
    fn jacobian(&self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>>;

    /// Whether the model may be evaluated at `x`. Trial points outside are rejected.
    fn is_admissible(&self, _x: &DVector<f64>) -> bool {
        true
    }
}

/// Loss applied to squared residuals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Loss {
    /// Ordinary least squares.
    Linear,
    /// `2(√(1+z) − 1)`: smooth approximation of absolute-value loss.
    #[default]
    SoftL1,
    /// Quadratic below `f_scale`, linear above.
    Huber,
    /// `ln(1 + z)`: strongly downweights outliers.
    Cauchy,
}

impl Loss {
    /// `(ρ, ρ', ρ'')` at `z = (f / f_scale)²`, rescaled so `cost = ½ Σ ρ`.
    fn evaluate(self, f: f64, f_scale: f64) -> (f64, f64, f64) {
        let z = (f / f_scale).powi(2);
        let (rho, d1, d2) = match self {
            Loss::Linear => (z, 1.0, 0.0),
            Loss::SoftL1 => {
                let t = 1.0 + z;
                (2.0 * (t.sqrt() - 1.0), t.powf(-0.5), -0.5 * t.powf(-1.5))
            }
            Loss::Huber => {
                if z <= 1.0 {
                    (z, 1.0, 0.0)
                } else {
                    let s = z.sqrt();
                    (2.0 * s - 1.0, 1.0 / s, -0.5 / (z * s))
                }
            }
            Loss::Cauchy => {
                let t = 1.0 + z;
                (t.ln(), 1.0 / t, -1.0 / (t * t))
            }
        };
        (rho * f_scale * f_scale, d1, d2 / (f_scale * f_scale))
    }

    fn cost(self, f: &DVector<f64>, f_scale: f64) -> f64 {
        0.5 * f.iter().map(|&fi| self.evaluate(fi, f_scale).0).sum::<f64>()
    }

    /// Rescale residuals and Jacobian rows so that `½|f̃|²` models the robust cost.
    fn scale(self, jac: &DMatrix<f64>, f: &DVector<f64>, f_scale: f64) -> (DMatrix<f64>, DVector<f64>) {
        if self == Loss::Linear {
            return (jac.clone(), f.clone());
        }
        let mut scaled_jac = jac.clone();
        let mut scaled_f = f.clone();
        for i in 0..f.len() {
            let (_, d1, d2) = self.evaluate(f[i], f_scale);
            let w = (d1 + 2.0 * d2 * f[i] * f[i]).max(f64::EPSILON).sqrt();
            scaled_f[i] *= d1 / w;
            scaled_jac.row_mut(i).scale_mut(w);
        }
        (scaled_jac, scaled_f)
    }
}

/// Box constraints on the variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> SolverResult<Self> {
        if lower.len() != upper.len() {
            return Err(SolverError::ProblemSetup {
                what: format!("{} lower bounds for {} upper bounds", lower.len(), upper.len()),
            });
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(SolverError::ProblemSetup {
                    what: format!("invalid bounds for variable {i}: [{lo}, {hi}]"),
                });
            }
        }
        Ok(Self {
            lower: DVector::from_vec(lower),
            upper: DVector::from_vec(upper),
        })
    }

    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: DVector::from_element(n, f64::NEG_INFINITY),
            upper: DVector::from_element(n, f64::INFINITY),
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn contains(&self, x: &DVector<f64>) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }

    pub fn clip(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(v, (lo, hi))| v.clamp(*lo, *hi)),
        )
    }

    /// Variables pinned at a bound that the descent direction `-g` pushes against.
    fn blocked(&self, x: &DVector<f64>, g: &DVector<f64>) -> Vec<bool> {
        (0..x.len())
            .map(|i| {
                let at_lower = x[i] <= self.lower[i] + 1e-12 * (1.0 + self.lower[i].abs());
                let at_upper = x[i] >= self.upper[i] - 1e-12 * (1.0 + self.upper[i].abs());
                (at_lower && g[i] > 0.0) || (at_upper && g[i] < 0.0)
            })
            .collect()
    }
}

/// Least-squares solver configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeastSquaresConfig {
    /// Maximum accepted-or-rejected outer iterations
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance
    pub ftol: f64,
    /// Relative step tolerance
    pub xtol: f64,
    /// Tolerance on the projected gradient (infinity norm)
    pub gtol: f64,
    /// Loss function
    pub loss: Loss,
    /// Residual scale at which the robust loss departs from quadratic
    pub f_scale: f64,
    /// Initial damping relative to the largest diagonal of JᵗJ
    pub initial_damping: f64,
}

impl Default for LeastSquaresConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1e-14,
            xtol: 1e-14,
            gtol: 1e-14,
            loss: Loss::SoftL1,
            f_scale: 1.0,
            initial_damping: 1e-3,
        }
    }
}

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    Gradient,
    CostReduction,
    StepSize,
}

/// Least-squares solution.
#[derive(Clone, Debug)]
pub struct LeastSquaresResult {
    pub x: DVector<f64>,
    /// Raw residuals at `x`
    pub residuals: DVector<f64>,
    /// Loss-weighted Jacobian at `x`; `JᵗJ` approximates the cost Hessian
    pub jacobian: DMatrix<f64>,
    /// `½ Σ ρ(fᵢ²)` at `x`
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

/// Solve a bounded, optionally robust, nonlinear least-squares problem.
pub fn least_squares<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    x0: &DVector<f64>,
    bounds: &Bounds,
    config: &LeastSquaresConfig,
) -> SolverResult<LeastSquaresResult> {
    if bounds.len() != x0.len() {
        return Err(SolverError::ProblemSetup {
            what: format!("{} bounds for {} variables", bounds.len(), x0.len()),
        });
    }
    if config.f_scale <= 0.0 {
        return Err(SolverError::ProblemSetup {
            what: format!("f_scale must be positive, got {}", config.f_scale),
        });
    }

    let n = x0.len();
    let mut x = bounds.clip(x0);
    if !problem.is_admissible(&x) {
        return Err(SolverError::ProblemSetup {
            what: format!("starting point {:?} is not admissible", x.as_slice()),
        });
    }

    let mut f = problem.residuals(&x)?;
    if f.len() < n {
        return Err(SolverError::ProblemSetup {
            what: format!("{} residuals for {} variables", f.len(), n),
        });
    }
    let mut cost = config.loss.cost(&f, config.f_scale);
    let mut evaluations = 1;

    let mut diag_scale = DVector::<f64>::zeros(n);
    let mut damping = f64::NAN;
    let mut nu = 2.0;

    for iter in 0..config.max_iterations {
        let raw_jac = problem.jacobian(&x)?;
        let (jac, scaled_f) = config.loss.scale(&raw_jac, &f, config.f_scale);
        let gradient = jac.transpose() * &scaled_f;
        let jtj = jac.transpose() * &jac;

        let blocked = bounds.blocked(&x, &gradient);
        let projected_gradient = gradient
            .iter()
            .zip(&blocked)
            .map(|(g, &b)| if b { 0.0 } else { g.abs() })
            .fold(0.0, f64::max);

        if projected_gradient <= config.gtol {
            debug!(iterations = iter, cost, "least squares converged on gradient");
            return Ok(finish(x, f, jac, cost, iter, evaluations, Termination::Gradient));
        }

        // Marquardt scaling: never shrink, so the damping stays scale invariant
        for i in 0..n {
            diag_scale[i] = diag_scale[i].max(jtj[(i, i)]).max(f64::EPSILON);
        }
        if damping.is_nan() {
            damping = config.initial_damping * jtj.diagonal().amax().max(f64::EPSILON);
        }

        let free: Vec<usize> = (0..n).filter(|&i| !blocked[i]).collect();

        let mut accepted = false;
        while !accepted {
            let step = damped_step(&jtj, &gradient, &diag_scale, damping, &free, n)?;
            let x_trial = bounds.clip(&(&x + &step));
            let actual_step = &x_trial - &x;

            if actual_step.norm() <= config.xtol * (config.xtol + x.norm()) {
                debug!(iterations = iter, cost, "least squares converged on step size");
                return Ok(finish(x, f, jac, cost, iter, evaluations, Termination::StepSize));
            }

            if !problem.is_admissible(&x_trial) {
                trace!(iteration = iter, damping, "trial point outside model domain");
                damping *= nu;
                nu *= 2.0;
                continue;
            }

            let f_trial = problem.residuals(&x_trial)?;
            evaluations += 1;
            let cost_trial = config.loss.cost(&f_trial, config.f_scale);

            let predicted = -(gradient.dot(&actual_step) + 0.5 * actual_step.dot(&(&jtj * &actual_step)));
            let actual = cost - cost_trial;

            if actual > 0.0 && predicted > 0.0 && cost_trial.is_finite() {
                let ratio = actual / predicted;
                damping *= (1.0 - (2.0 * ratio - 1.0).powi(3)).max(1.0 / 3.0);
                nu = 2.0;
                trace!(iteration = iter, cost = cost_trial, ratio, damping, "step accepted");

                let previous_cost = cost;
                let step_norm = actual_step.norm();
                let x_norm = x.norm();
                x = x_trial;
                f = f_trial;
                cost = cost_trial;
                accepted = true;

                if actual <= config.ftol * previous_cost {
                    let jac = config.loss.scale(&problem.jacobian(&x)?, &f, config.f_scale).0;
                    debug!(iterations = iter + 1, cost, "least squares converged on cost");
                    return Ok(finish(x, f, jac, cost, iter + 1, evaluations, Termination::CostReduction));
                }
                if step_norm <= config.xtol * (config.xtol + x_norm) {
                    let jac = config.loss.scale(&problem.jacobian(&x)?, &f, config.f_scale).0;
                    debug!(iterations = iter + 1, cost, "least squares converged on step size");
                    return Ok(finish(x, f, jac, cost, iter + 1, evaluations, Termination::StepSize));
                }
            } else {
                damping *= nu;
                nu *= 2.0;
            }

            if !damping.is_finite() {
                return Err(SolverError::Numeric {
                    what: format!("damping overflowed at iteration {iter}"),
                });
            }
        }
    }

    warn!(max_iterations = config.max_iterations, cost, "least squares budget exhausted");
    Err(SolverError::ConvergenceFailed {
        what: format!(
            "Maximum iterations {} reached, cost = {cost:e}",
            config.max_iterations
        ),
        last_iterate: x.as_slice().to_vec(),
        residual: cost,
    })
}

/// Solve `(JᵗJ + λD) δ = −g` on the free variables; blocked variables stay put.
fn damped_step(
    jtj: &DMatrix<f64>,
    gradient: &DVector<f64>,
    diag_scale: &DVector<f64>,
    damping: f64,
    free: &[usize],
    n: usize,
) -> SolverResult<DVector<f64>> {
    let k = free.len();
    let mut step = DVector::zeros(n);
    if k == 0 {
        return Ok(step);
    }
    let mut system = DMatrix::zeros(k, k);
    let mut rhs = DVector::zeros(k);
    for (a, &i) in free.iter().enumerate() {
        rhs[a] = -gradient[i];
        for (b, &j) in free.iter().enumerate() {
            system[(a, b)] = jtj[(i, j)];
        }
        system[(a, a)] += damping * diag_scale[i];
    }
    let solution = system
        .clone()
        .cholesky()
        .map(|c| c.solve(&rhs))
        .or_else(|| system.lu().solve(&rhs))
        .ok_or_else(|| SolverError::Numeric {
            what: "damped normal equations are singular".to_string(),
        })?;
    for (a, &i) in free.iter().enumerate() {
        step[i] = solution[a];
    }
    Ok(step)
}

fn finish(
    x: DVector<f64>,
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
    cost: f64,
    iterations: usize,
    evaluations: usize,
    termination: Termination,
) -> LeastSquaresResult {
    LeastSquaresResult {
        x,
        residuals,
        jacobian,
        cost,
        iterations,
        evaluations,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = p0 * exp(p1 * t)
    struct ExpDecay {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl ExpDecay {
        fn new(p0: f64, p1: f64) -> Self {
            let t: Vec<f64> = (0..30).map(|i| i as f64 * 0.1).collect();
            let y = t.iter().map(|t| p0 * (p1 * t).exp()).collect();
            Self { t, y }
        }
    }

    impl LeastSquaresProblem for ExpDecay {
        fn residuals(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
            Ok(DVector::from_iterator(
                self.t.len(),
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(t, y)| x[0] * (x[1] * t).exp() - y),
            ))
        }

        fn jacobian(&self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
            let mut j = DMatrix::zeros(self.t.len(), 2);
            for (i, t) in self.t.iter().enumerate() {
                let e = (x[1] * t).exp();
                j[(i, 0)] = e;
                j[(i, 1)] = x[0] * t * e;
            }
            Ok(j)
        }
    }

    #[test]
    fn recovers_exact_parameters() {
        let problem = ExpDecay::new(2.5, -1.3);
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let result = least_squares(
            &problem,
            &x0,
            &Bounds::unbounded(2),
            &LeastSquaresConfig::default(),
        )
        .unwrap();
        assert!((result.x[0] - 2.5).abs() < 1e-8);
        assert!((result.x[1] + 1.3).abs() < 1e-8);
        assert!(result.cost < 1e-16);
    }

    #[test]
    fn linear_loss_matches_soft_l1_without_outliers() {
        let problem = ExpDecay::new(1.0, -0.5);
        let x0 = DVector::from_vec(vec![0.5, -0.1]);
        let config = LeastSquaresConfig {
            loss: Loss::Linear,
            ..LeastSquaresConfig::default()
        };
        let result = least_squares(&problem, &x0, &Bounds::unbounded(2), &config).unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-8);
        assert!((result.x[1] + 0.5).abs() < 1e-8);
    }

    #[test]
    fn active_bound_is_respected() {
        // True p1 = -1.3, but p1 is bounded below by -1.0
        let problem = ExpDecay::new(2.5, -1.3);
        let bounds = Bounds::new(vec![0.0, -1.0], vec![10.0, 1.0]).unwrap();
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let result = least_squares(&problem, &x0, &bounds, &LeastSquaresConfig::default()).unwrap();
        assert!(bounds.contains(&result.x));
        assert!((result.x[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn robust_loss_downweights_outlier() {
        let mut problem = ExpDecay::new(2.0, -0.7);
        problem.y[5] += 5.0;
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let plain = least_squares(
            &problem,
            &x0,
            &Bounds::unbounded(2),
            &LeastSquaresConfig {
                loss: Loss::Linear,
                ..LeastSquaresConfig::default()
            },
        )
        .unwrap();
        let robust = least_squares(
            &problem,
            &plain.x,
            &Bounds::unbounded(2),
            &LeastSquaresConfig {
                loss: Loss::SoftL1,
                f_scale: 0.05,
                ..LeastSquaresConfig::default()
            },
        )
        .unwrap();
        assert!((robust.x[0] - 2.0).abs() < (plain.x[0] - 2.0).abs());
    }

    #[test]
    fn iteration_budget_reports_last_iterate() {
        let problem = ExpDecay::new(2.5, -1.3);
        let config = LeastSquaresConfig {
            max_iterations: 1,
            ..LeastSquaresConfig::default()
        };
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let err = least_squares(&problem, &x0, &Bounds::unbounded(2), &config).unwrap_err();
        match err {
            SolverError::ConvergenceFailed { last_iterate, .. } => assert_eq!(last_iterate.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_bounds_rejected() {
        assert!(Bounds::new(vec![1.0], vec![0.0]).is_err());
        assert!(Bounds::new(vec![0.0, 0.0], vec![1.0]).is_err());
    }

    #[test]
    fn loss_derivatives_are_consistent() {
        for loss in [Loss::Linear, Loss::SoftL1, Loss::Huber, Loss::Cauchy] {
            for &f in &[0.3, 0.9, 2.0, 7.5] {
                let (rho, d1, _) = loss.evaluate(f, 1.0);
                let h = 1e-6;
                let z = f * f;
                let (rp, _, _) = loss.evaluate((z + h).sqrt(), 1.0);
                let (rm, _, _) = loss.evaluate((z - h).sqrt(), 1.0);
                assert!(rho >= 0.0);
                assert!(((rp - rm) / (2.0 * h) - d1).abs() < 1e-6, "{loss:?} at {f}");
            }
        }
    }
}
