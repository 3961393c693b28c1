use std::error::Error as StdError;

use thiserror::Error;

use super::{bounds::BoundsError, config::ConfigError, oracle::EvalError};

/// Errors that can occur during a BOBYQA search.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid bounds: {0}")]
    InvalidBounds(#[from] BoundsError),

    #[error("start point component {index} is not finite")]
    InvalidStartPoint { index: usize },

    /// The evaluation budget ran out before the search finished.
    #[error("evaluation budget of {max_evals} exceeded")]
    BudgetExceeded { max_evals: usize },

    /// A trust region step failed to reduce the quadratic model.
    ///
    /// This cannot happen in exact arithmetic and signals a corrupted model.
    #[error("trust region step predicted a non-negative change of {predicted}")]
    ModelInconsistency { predicted: f64 },

    #[error("observer stopped the search before any successful evaluation")]
    NoSuccessfulEvaluation,

    #[error("problem error")]
    Problem(#[source] Box<dyn StdError + Send + Sync>),

    #[error("model call failed")]
    Model(#[source] Box<dyn StdError + Send + Sync>),
}

impl<ME, PE> From<EvalError<ME, PE>> for Error
where
    ME: StdError + Send + Sync + 'static,
    PE: StdError + Send + Sync + 'static,
{
    fn from(err: EvalError<ME, PE>) -> Self {
        match err {
            EvalError::Model(e) => Self::Model(Box::new(e)),
            EvalError::Problem(e) => Self::Problem(Box::new(e)),
        }
    }
}
