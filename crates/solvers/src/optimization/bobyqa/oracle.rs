use std::array;

use dfo_core::{Model, Observer, OptimizationProblem, Snapshot};
use thiserror::Error;

use super::{Action, Error, Event, Point, Solution, Status, Step};

/// Errors that can occur when evaluating an optimization problem.
#[derive(Debug, Error)]
pub enum EvalError<ME, PE> {
    /// The model call failed.
    #[error("model call failed")]
    Model(#[source] ME),

    /// Failed to construct input or compute the objective.
    #[error("problem error")]
    Problem(#[source] PE),
}

/// Why the search left its main loop without finishing.
#[derive(Debug)]
pub(super) enum Halt {
    /// An observer asked to stop.
    StopEarly,

    /// The search cannot continue.
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(error: Error) -> Self {
        Self::Failed(error)
    }
}

/// Scalar objective seen by the algorithm phases.
///
/// Values are always minimized; any maximization transform has already been
/// applied by the implementation.
pub(super) trait Objective {
    /// Evaluates the objective at `x`, given in the caller's coordinates.
    fn evaluate(&mut self, x: &[f64], step: Step) -> Result<f64, Halt>;
}

struct Best<I, O, const N: usize> {
    point: Point<N>,
    score: f64,
    snapshot: Snapshot<I, O>,
}

/// Evaluates a model within an optimization problem on behalf of the search.
///
/// Enforces the evaluation budget, keeps the best point seen so far, and
/// reports every evaluation to the observer.
pub(super) struct Evaluator<'a, M, P, Obs, F, const N: usize>
where
    M: Model,
{
    model: &'a M,
    problem: &'a P,
    observer: Obs,
    transform: F,
    max_evals: usize,
    evals: usize,
    best: Option<Best<M::Input, M::Output, N>>,
}

impl<'a, M, P, Obs, F, const N: usize> Evaluator<'a, M, P, Obs, F, N>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
    Obs: for<'e> Observer<Event<'e, M, P, N>, Action>,
    F: Fn(f64) -> f64,
{
    pub(super) fn new(
        model: &'a M,
        problem: &'a P,
        observer: Obs,
        transform: F,
        max_evals: usize,
    ) -> Self {
        Self {
            model,
            problem,
            observer,
            transform,
            max_evals,
            evals: 0,
            best: None,
        }
    }

    /// Consumes the evaluator and builds the solution from the best point.
    pub(super) fn into_solution(
        self,
        status: Status,
        rho: f64,
    ) -> Result<Solution<M::Input, M::Output, N>, Error> {
        let best = self.best.ok_or(Error::NoSuccessfulEvaluation)?;
        Ok(Solution {
            status,
            x: best.point.x,
            objective: best.point.objective,
            snapshot: best.snapshot,
            evals: self.evals,
            rho,
        })
    }

    fn best_point(&self) -> Option<Point<N>> {
        self.best.as_ref().map(|best| best.point)
    }
}

impl<M, P, Obs, F, const N: usize> Objective for Evaluator<'_, M, P, Obs, F, N>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
    Obs: for<'e> Observer<Event<'e, M, P, N>, Action>,
    F: Fn(f64) -> f64,
{
    fn evaluate(&mut self, x: &[f64], step: Step) -> Result<f64, Halt> {
        if self.evals >= self.max_evals {
            return Err(Error::BudgetExceeded {
                max_evals: self.max_evals,
            }
            .into());
        }
        self.evals += 1;

        let x: [f64; N] = array::from_fn(|i| x[i]);
        match evaluate(self.model, self.problem, &x) {
            Ok((objective, snapshot)) => {
                let point = Point::new(x, objective);
                let score = (self.transform)(objective);
                let improves = self.best.as_ref().is_none_or(|best| score < best.score);
                let best = match self.best_point() {
                    Some(best) if !improves => best,
                    _ => point,
                };

                let event = Event::Evaluated {
                    point,
                    input: &snapshot.input,
                    output: &snapshot.output,
                    best,
                    step,
                };
                let action = self.observer.observe(&event);

                if improves {
                    self.best = Some(Best {
                        point,
                        score,
                        snapshot,
                    });
                }

                match action {
                    Some(Action::StopEarly) => Err(Halt::StopEarly),
                    None => Ok(score),
                }
            }
            Err(error) => {
                let best = self.best_point();
                match Event::emit_failure(x, best, step, &error, &mut self.observer) {
                    Some(Action::StopEarly) => Err(Halt::StopEarly),
                    None => Err(Halt::Failed(error.into())),
                }
            }
        }
    }
}

/// Maps `x` to model input, calls the model, then computes the objective.
fn evaluate<M, P, const N: usize>(
    model: &M,
    problem: &P,
    x: &[f64; N],
) -> Result<(f64, Snapshot<M::Input, M::Output>), EvalError<M::Error, P::Error>>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
{
    let input = problem.input(x).map_err(EvalError::Problem)?;
    let output = model.call(&input).map_err(EvalError::Model)?;
    let objective = problem
        .objective(&input, &output)
        .map_err(EvalError::Problem)?;

    Ok((objective, Snapshot::new(input, output)))
}
