use dfo_core::{Model, Observer, OptimizationProblem};

use super::{Action, Point, oracle::EvalError};

/// The kind of point being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A point of the initial interpolation set.
    Initial,

    /// The solution of a trust region subproblem.
    TrustRegion,

    /// A point chosen to improve the interpolation geometry.
    Geometry,

    /// A last short trust region step tried before returning.
    Final,
}

/// Events emitted by the BOBYQA solver, one per objective evaluation.
pub enum Event<'a, M, P, const N: usize>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
{
    /// Successful evaluation.
    Evaluated {
        /// The evaluated point (x and objective).
        point: Point<N>,

        /// The model input at this point.
        input: &'a M::Input,

        /// The model output at this point.
        output: &'a M::Output,

        /// The best point so far, this evaluation included.
        best: Point<N>,

        /// What produced the point.
        step: Step,
    },

    /// Model evaluation failed.
    ModelFailed {
        /// The x value where evaluation failed.
        x: [f64; N],

        /// The best point so far, if any evaluation has succeeded.
        best: Option<Point<N>>,

        /// What produced the point.
        step: Step,

        /// The model error.
        error: &'a M::Error,
    },

    /// Problem method failed (input construction or objective computation).
    ProblemFailed {
        /// The x value where evaluation failed.
        x: [f64; N],

        /// The best point so far, if any evaluation has succeeded.
        best: Option<Point<N>>,

        /// What produced the point.
        step: Step,

        /// The problem error.
        error: &'a P::Error,
    },
}

impl<M, P, const N: usize> Event<'_, M, P, N>
where
    M: Model,
    P: OptimizationProblem<N, Input = M::Input, Output = M::Output>,
{
    /// Returns the x value that was evaluated (or attempted).
    #[must_use]
    pub fn x(&self) -> [f64; N] {
        match self {
            Self::Evaluated { point, .. } => point.x,
            Self::ModelFailed { x, .. } | Self::ProblemFailed { x, .. } => *x,
        }
    }

    /// Returns the best point so far, if any.
    #[must_use]
    pub fn best(&self) -> Option<Point<N>> {
        match self {
            Self::Evaluated { best, .. } => Some(*best),
            Self::ModelFailed { best, .. } | Self::ProblemFailed { best, .. } => *best,
        }
    }

    /// Returns what produced the evaluated point.
    #[must_use]
    pub fn step(&self) -> Step {
        match self {
            Self::Evaluated { step, .. }
            | Self::ModelFailed { step, .. }
            | Self::ProblemFailed { step, .. } => *step,
        }
    }

    /// Emits a failure event and returns the observer's action.
    pub(super) fn emit_failure<Obs>(
        x: [f64; N],
        best: Option<Point<N>>,
        step: Step,
        error: &EvalError<M::Error, P::Error>,
        observer: &mut Obs,
    ) -> Option<Action>
    where
        Obs: for<'a> Observer<Event<'a, M, P, N>, Action>,
    {
        match error {
            EvalError::Model(e) => {
                let event = Event::ModelFailed {
                    x,
                    best,
                    step,
                    error: e,
                };
                observer.observe(&event)
            }
            EvalError::Problem(e) => {
                let event = Event::ProblemFailed {
                    x,
                    best,
                    step,
                    error: e,
                };
                observer.observe(&event)
            }
        }
    }
}
