//! Numerical solvers for carbspec.
//!
//! This crate provides the generic machinery the chemistry crates build on:
//! a damped Newton root finder, finite-difference derivative checks and a bounded
//! trust-region nonlinear least-squares solver with robust losses.

pub mod error;
pub mod jacobian;
pub mod least_squares;
pub mod newton;

pub use error::{SolverError, SolverResult};
pub use least_squares::{
    Bounds, LeastSquaresConfig, LeastSquaresProblem, LeastSquaresResult, Loss, Termination,
    least_squares,
};
pub use newton::{NewtonConfig, NewtonResult, newton_solve, newton_solve_in, newton_scalar};
