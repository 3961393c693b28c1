//! BOBYQA: bound-constrained optimization by quadratic approximation.
//!
//! # Algorithm
//!
//! BOBYQA minimizes (or maximizes) a scalar objective of `N >= 2` variables
//! subject to `lower <= x <= upper`, without derivatives. It keeps a set of
//! interpolation points and a quadratic model that matches the objective at
//! every point. Each iteration either minimizes the model within a trust
//! region around the best point, or moves one point to keep the set well
//! spread out. After every evaluation one point is replaced and the model is
//! updated in place, using the least Frobenius norm change of its second
//! derivatives.
//!
//! The trust region radius adapts to how well the model predicted the last
//! step, but never drops below a floor `rho`. The floor shrinks from the
//! initial radius to the stopping radius as the model runs out of progress;
//! the search converges when it can shrink no further.
//!
//! # When to Use
//!
//! BOBYQA is appropriate when:
//! - Derivatives are unavailable and evaluations are expensive
//! - The objective is reasonably smooth
//! - The only constraints are simple bounds
//!
//! # Limitations
//!
//! - **At least two variables**: use a one-dimensional method for `N = 1`
//! - **Local method**: finds a local optimum near the start point
//! - **Evaluation budget**: running out of evaluations is an error, since
//!   the result has not converged
//!
//! # Feasibility
//!
//! Every evaluated point lies within the bounds. Points on a bound are
//! exactly equal to it. If the start point is outside the bounds or within
//! the initial radius of one, it is moved before the first evaluation.
//!
//! # Observer Events
//!
//! The solver emits one [`Event`] per evaluation:
//!
//! - [`Event::Evaluated`]: evaluation succeeded
//! - [`Event::ModelFailed`]: model returned an error
//! - [`Event::ProblemFailed`]: problem returned an error (input or objective)
//!
//! Each event carries the best point so far and the [`Step`] that produced
//! the evaluated point. Observers can return [`Action::StopEarly`] to halt
//! immediately and return the best point found.

mod action;
mod bounds;
mod config;
mod controller;
mod driver;
mod error;
mod event;
mod geometry;
mod init;
mod oracle;
mod point;
mod radius;
mod search;
mod solution;
mod state;
mod symmetric;
mod trust_region;
mod update;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use bounds::{Bounds, BoundsError};
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::{Event, Step};
pub use oracle::EvalError;
pub use point::Point;
pub use solution::{Solution, Status};

use dfo_core::{Model, Observer, OptimizationProblem};

use search::search;

/// Finds a minimum of the objective within `bounds`, starting from `x0`.
///
/// The observer receives an [`Event`] for each evaluation.
/// See the [module docs](self) for details on observer actions.
///
/// # Errors
///
/// Returns an error if the config, bounds, or start point is invalid, if
/// the evaluation budget runs out, or if the model or problem fails during
/// evaluation and the observer does not stop the search.
pub fn minimize<M, P, Obs, const N: usize>(
    model: &M,
    problem: &P,
    x0: [f64; N],
    bounds: &Bounds<N>,
    config: &Config,
    observer: Obs,
) -> Result<Solution<M::Input, M::Output, N>, Error>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M, P, N>, Action>,
{
    search(model, problem, x0, bounds, config, observer, |v| v)
}

/// Finds a minimum of the objective without observer support.
///
/// This is a convenience wrapper around [`minimize`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error if the inputs are invalid, if the evaluation budget runs
/// out, or if the model or problem fails during evaluation.
pub fn minimize_unobserved<M, P, const N: usize>(
    model: &M,
    problem: &P,
    x0: [f64; N],
    bounds: &Bounds<N>,
    config: &Config,
) -> Result<Solution<M::Input, M::Output, N>, Error>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
{
    minimize(model, problem, x0, bounds, config, ())
}

/// Finds a maximum of the objective within `bounds`, starting from `x0`.
///
/// Objectives are negated internally; every reported objective, in events
/// and in the [`Solution`], keeps the sign computed by the problem.
///
/// # Errors
///
/// Returns an error if the config, bounds, or start point is invalid, if
/// the evaluation budget runs out, or if the model or problem fails during
/// evaluation and the observer does not stop the search.
pub fn maximize<M, P, Obs, const N: usize>(
    model: &M,
    problem: &P,
    x0: [f64; N],
    bounds: &Bounds<N>,
    config: &Config,
    observer: Obs,
) -> Result<Solution<M::Input, M::Output, N>, Error>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M, P, N>, Action>,
{
    search(model, problem, x0, bounds, config, observer, |v| -v)
}

/// Finds a maximum of the objective without observer support.
///
/// This is a convenience wrapper around [`maximize`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error if the inputs are invalid, if the evaluation budget runs
/// out, or if the model or problem fails during evaluation.
pub fn maximize_unobserved<M, P, const N: usize>(
    model: &M,
    problem: &P,
    x0: [f64; N],
    bounds: &Bounds<N>,
    config: &Config,
) -> Result<Solution<M::Input, M::Output, N>, Error>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
{
    maximize(model, problem, x0, bounds, config, ())
}
