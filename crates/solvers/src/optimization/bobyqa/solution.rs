use dfo_core::Snapshot;

/// Indicates why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The trust region floor reached the stopping radius.
    Converged,

    /// Rounding errors destroyed the denominator of a model update.
    ///
    /// The interpolation geometry can no longer be repaired, so the best
    /// point found so far is returned.
    DenominatorCancellation,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The result of a BOBYQA search.
#[derive(Debug, Clone)]
pub struct Solution<I, O, const N: usize> {
    /// Final solver status.
    pub status: Status,

    /// Best point found, in the caller's coordinates.
    pub x: [f64; N],

    /// Objective value at `x`.
    pub objective: f64,

    /// Snapshot at `x`.
    pub snapshot: Snapshot<I, O>,

    /// Number of objective evaluations performed.
    pub evals: usize,

    /// Final trust region floor radius.
    pub rho: f64,
}
