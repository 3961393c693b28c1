//! Solvers for optimization problems: minimizing or maximizing an objective.
//!
//! An [`OptimizationProblem`] maps solver variables `x: [f64; N]` to model
//! inputs, calls the model, and extracts a scalar objective. Solvers in this
//! module search for the `x` that minimizes or maximizes that objective.
//!
//! # Solvers
//!
//! - [`bobyqa`]: derivative-free, bound-constrained search driven by a
//!   quadratic interpolation model and a trust region
//!
//! [`OptimizationProblem`]: dfo_core::OptimizationProblem

pub mod bobyqa;
