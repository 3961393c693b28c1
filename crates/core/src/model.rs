/// The computation a derivative-free solver samples.
///
/// A model turns a typed input into a typed output, typically at some cost:
/// a simulation, an experiment, an external program. Solvers never see the
/// model's types directly. An [`OptimizationProblem`] builds the input from
/// the solver variables and reduces the output to a scalar objective.
///
/// Calls must be deterministic. The solvers in this workspace interpolate
/// past results, so two different outputs for one input corrupt the model
/// they fit.
///
/// [`OptimizationProblem`]: crate::OptimizationProblem
pub trait Model {
    type Input;
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Evaluates the model at `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when the model cannot produce an output for
    /// this input, for example outside its domain of validity.
    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// The input and output of one successful model call.
///
/// Solvers keep the snapshot of their best evaluation so callers get the
/// full model state at the optimum, not just the objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot<I, O> {
    pub input: I,
    pub output: O,
}

impl<I, O> Snapshot<I, O> {
    /// Pairs a model input with the output it produced.
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }
}
