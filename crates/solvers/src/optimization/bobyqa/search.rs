use dfo_core::{Model, Observer, OptimizationProblem};
use log::info;

use super::{
    Action, Bounds, Config, Error, Event, Solution, Status,
    controller::Controller,
    driver::prepare,
    oracle::{Evaluator, Halt},
};

/// Core BOBYQA search implementation.
///
/// The `transform` function is applied to objective values before the
/// algorithm sees them, allowing the same code to handle both minimization
/// (transform = identity) and maximization (transform = negation).
pub(super) fn search<M, P, Obs, F, const N: usize>(
    model: &M,
    problem: &P,
    x0: [f64; N],
    bounds: &Bounds<N>,
    config: &Config,
    observer: Obs,
    transform: F,
) -> Result<Solution<M::Input, M::Output, N>, Error>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
    Obs: for<'a> Observer<Event<'a, M, P, N>, Action>,
    F: Fn(f64) -> f64,
{
    let (mut state, radius) = prepare(&x0, bounds, config)?;
    let mut evaluator = Evaluator::new(model, problem, observer, transform, config.max_evals());
    let mut controller = Controller::new(radius, N);

    let status = match controller.run(&mut state, &mut evaluator) {
        Ok(status) => status,
        Err(Halt::StopEarly) => Status::StoppedByObserver,
        Err(Halt::Failed(error)) => return Err(error),
    };

    let solution = evaluator.into_solution(status, controller.rho())?;
    info!(
        "bobyqa finished with {:?} after {} evaluations, objective {:e}",
        solution.status, solution.evals, solution.objective
    );
    Ok(solution)
}
