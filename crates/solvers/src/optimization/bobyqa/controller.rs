use log::{debug, trace};
use ndarray::Array1;

use super::{
    Error, Status,
    event::Step,
    geometry::alternative_move,
    init::initialize,
    oracle::{Halt, Objective},
    radius::TrustRegion,
    state::{Lagrange, ModelState},
    trust_region::{self, Curvature},
};

/// What kind of step the current candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// A trust region step long enough to be worth evaluating.
    TrustRegion,

    /// A step that improves the geometry of the interpolation set.
    Geometry,

    /// A trust region step shorter than `rho / 2`.
    ShortStep,
}

/// The next unit of work in the main loop.
enum Phase {
    RecenterModel,
    SolveSubproblem,
    ShiftBase,
    GeometryStep,
    PrepareCandidate,
    EvaluateCandidate(Lagrange),
    SeekFarPoint { distsq: f64 },
    ReduceFloor,
    FinalStep,
    Terminate(Status),
}

/// Drives the search from the initial interpolation set to termination.
pub(super) struct Controller {
    radius: TrustRegion,
    mode: Mode,
    /// Evaluations so far, and at the last step longer than `rho`.
    nf: usize,
    nfsav: usize,
    /// Model errors at the three most recent evaluations, newest first.
    errors: [f64; 3],
    /// Consecutive iterations in which the least Frobenius norm model
    /// looked better than the current one.
    itest: usize,
    ratio: f64,
    dnorm: f64,
    dsq: f64,
    xnew: Array1<f64>,
    xalt: Array1<f64>,
    d: Array1<f64>,
    gnew: Array1<f64>,
    curvature: Curvature,
    knew: usize,
    adelt: f64,
    alpha: f64,
    cauchy: f64,
    denom: f64,
}

impl Controller {
    pub(super) fn new(radius: TrustRegion, n: usize) -> Self {
        Self {
            radius,
            mode: Mode::TrustRegion,
            nf: 0,
            nfsav: 0,
            errors: [0.0; 3],
            itest: 0,
            ratio: 0.0,
            dnorm: 0.0,
            dsq: 0.0,
            xnew: Array1::zeros(n),
            xalt: Array1::zeros(n),
            d: Array1::zeros(n),
            gnew: Array1::zeros(n),
            curvature: Curvature::Interior(None),
            knew: 0,
            adelt: 0.0,
            alpha: 0.0,
            cauchy: 0.0,
            denom: 0.0,
        }
    }

    /// Returns the current trust region floor.
    pub(super) fn rho(&self) -> f64 {
        self.radius.rho()
    }

    /// Runs the search to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`Halt`] when the objective stops the search or fails, or
    /// when the model becomes inconsistent.
    pub(super) fn run<O: Objective>(
        &mut self,
        state: &mut ModelState,
        objective: &mut O,
    ) -> Result<Status, Halt> {
        initialize(state, self.radius.rho(), objective)?;
        self.nf = state.npt();
        self.nfsav = self.nf;

        let mut phase = Phase::RecenterModel;
        loop {
            phase = match phase {
                Phase::RecenterModel => {
                    if state.kopt != 0 {
                        state.recenter_gradient();
                    }
                    Phase::SolveSubproblem
                }
                Phase::SolveSubproblem => self.solve_subproblem(state),
                Phase::ShiftBase => self.shift_base(state),
                Phase::GeometryStep => self.geometry_step(state),
                Phase::PrepareCandidate => self.prepare_candidate(state),
                Phase::EvaluateCandidate(lagrange) => {
                    self.evaluate_candidate(state, lagrange, objective)?
                }
                Phase::SeekFarPoint { distsq } => self.seek_far_point(state, distsq),
                Phase::ReduceFloor => self.reduce_floor(),
                Phase::FinalStep => {
                    let x = state.absolute(self.xnew.view());
                    objective.evaluate(&x, Step::Final)?;
                    self.nf += 1;
                    Phase::Terminate(Status::Converged)
                }
                Phase::Terminate(status) => return Ok(status),
            };
        }
    }

    fn solve_subproblem(&mut self, state: &ModelState) -> Phase {
        let rho = self.radius.rho();
        let step = trust_region::solve(state, self.radius.delta());
        self.xnew = step.xnew;
        self.d = step.d;
        self.dsq = step.dsq;
        self.gnew = step.gradient;
        self.curvature = step.curvature;
        self.dnorm = self.radius.delta().min(step.dsq.sqrt());

        if self.dnorm >= 0.5 * rho {
            self.mode = Mode::TrustRegion;
            return Phase::ShiftBase;
        }

        self.mode = Mode::ShortStep;
        let distsq = (10.0 * rho).powi(2);
        if self.nf <= self.nfsav + 2 {
            return Phase::SeekFarPoint { distsq };
        }

        // The floor may only drop if the model has been accurate lately,
        // including along coordinates held at a bound.
        let errbig = self.errors.iter().copied().fold(0.0, f64::max);
        let frhosq = 0.125 * rho * rho;
        if matches!(self.curvature, Curvature::Interior(Some(least)) if errbig > frhosq * least) {
            return Phase::SeekFarPoint { distsq };
        }
        let bdtol = errbig / rho;
        for j in 0..state.n() {
            let mut bdtest = bdtol;
            if self.xnew[j] == state.sl[j] {
                bdtest = self.gnew[j];
            }
            if self.xnew[j] == state.su[j] {
                bdtest = -self.gnew[j];
            }
            if bdtest < bdtol {
                bdtest += 0.5 * state.diagonal_curvature(j) * rho;
                if bdtest < bdtol {
                    return Phase::SeekFarPoint { distsq };
                }
            }
        }
        Phase::ReduceFloor
    }

    fn shift_base(&mut self, state: &mut ModelState) -> Phase {
        let xoptsq = state.xopt.dot(&state.xopt);
        if self.dsq <= 1e-3 * xoptsq {
            debug!("shifting base point by {:?}", state.xopt);
            state.shift_base(&mut self.xnew);
        }
        match self.mode {
            Mode::Geometry => Phase::GeometryStep,
            Mode::TrustRegion | Mode::ShortStep => Phase::PrepareCandidate,
        }
    }

    fn geometry_step(&mut self, state: &ModelState) -> Phase {
        let candidate = alternative_move(state, self.knew, self.adelt);
        self.d = &candidate.xnew - &state.xopt;
        self.xnew = candidate.xnew;
        self.xalt = candidate.xalt;
        self.alpha = candidate.alpha;
        self.cauchy = candidate.cauchy;
        Phase::PrepareCandidate
    }

    fn prepare_candidate(&mut self, state: &ModelState) -> Phase {
        loop {
            let lagrange = state.lagrange_values(self.d.view());

            if self.mode == Mode::Geometry {
                let vlag = lagrange.vlag[self.knew];
                let denom = vlag * vlag + self.alpha * lagrange.beta;
                if denom < self.cauchy && self.cauchy > 0.0 {
                    self.xnew.assign(&self.xalt);
                    self.d = &self.xnew - &state.xopt;
                    self.cauchy = 0.0;
                    continue;
                }
                if denom <= 0.5 * vlag * vlag {
                    debug!("geometry step denominator {denom:e} lost to cancellation");
                    return Phase::Terminate(Status::DenominatorCancellation);
                }
                self.denom = denom;
            } else {
                let Some(discard) = state.select_discard(
                    &lagrange,
                    self.radius.delta(),
                    state.xopt.view(),
                    Some(state.kopt),
                ) else {
                    debug!("no interpolation point can be replaced reliably");
                    return Phase::Terminate(Status::DenominatorCancellation);
                };
                self.knew = discard.index;
                self.denom = discard.denom;
            }

            return Phase::EvaluateCandidate(lagrange);
        }
    }

    fn evaluate_candidate<O: Objective>(
        &mut self,
        state: &mut ModelState,
        lagrange: Lagrange,
        objective: &mut O,
    ) -> Result<Phase, Halt> {
        let step = if self.mode == Mode::Geometry {
            Step::Geometry
        } else {
            Step::TrustRegion
        };
        let x = state.absolute(self.xnew.view());
        let f = objective.evaluate(&x, step)?;
        self.nf += 1;

        let fopt = state.fopt();
        let vquad = state.predicted_change(self.d.view(), &lagrange.xpt_d);
        let diff = f - fopt - vquad;
        self.errors = [diff.abs(), self.errors[0], self.errors[1]];
        if self.dnorm > self.radius.rho() {
            self.nfsav = self.nf;
        }

        if self.mode == Mode::TrustRegion {
            if vquad >= 0.0 {
                return Err(Error::ModelInconsistency { predicted: vquad }.into());
            }
            self.ratio = (f - fopt) / vquad;
            self.radius.after_step(self.ratio, self.dnorm);
            trace!(
                "ratio {:.3e}, delta now {:.3e}",
                self.ratio,
                self.radius.delta()
            );

            // A new best point may change which point should leave.
            if f < fopt {
                if let Some(discard) =
                    state.select_discard(&lagrange, self.radius.delta(), self.xnew.view(), None)
                {
                    self.knew = discard.index;
                    self.denom = discard.denom;
                }
            }
        }

        state.replace_point(self.knew, &self.xnew, &self.d, f, diff, lagrange, self.denom);

        if self.mode == Mode::TrustRegion {
            let candidate = state.least_frobenius();
            self.itest += 1;
            if candidate.current_sq < 10.0 * candidate.alternative_sq {
                self.itest = 0;
            }
            if self.itest >= 3 {
                debug!("replacing the model by its least Frobenius norm interpolant");
                state.install(candidate);
                self.itest = 0;
            }
        }

        if self.mode == Mode::Geometry || f <= fopt + 0.1 * vquad {
            return Ok(Phase::SolveSubproblem);
        }
        let delta = self.radius.delta();
        let rho = self.radius.rho();
        let distsq = (4.0 * delta * delta).max(100.0 * rho * rho);
        Ok(Phase::SeekFarPoint { distsq })
    }

    fn seek_far_point(&mut self, state: &ModelState, distsq: f64) -> Phase {
        let mut farthest = None;
        let mut distsq = distsq;
        for k in 0..state.npt() {
            let sum: f64 = state
                .xpt
                .row(k)
                .iter()
                .zip(&state.xopt)
                .map(|(x, o)| (x - o) * (x - o))
                .sum();
            if sum > distsq {
                farthest = Some(k);
                distsq = sum;
            }
        }

        if let Some(k) = farthest {
            let dist = distsq.sqrt();
            if self.mode == Mode::ShortStep {
                self.radius.before_geometry_step(dist);
            }
            let rho = self.radius.rho();
            self.mode = Mode::Geometry;
            self.knew = k;
            self.adelt = (0.1 * dist).min(self.radius.delta()).max(rho);
            self.dsq = self.adelt * self.adelt;
            debug!("geometry step replaces point {k} at distance {dist:.3e}");
            return Phase::ShiftBase;
        }

        if self.mode == Mode::ShortStep {
            return Phase::ReduceFloor;
        }
        if self.ratio > 0.0 || self.radius.delta().max(self.dnorm) > self.radius.rho() {
            return Phase::SolveSubproblem;
        }
        Phase::ReduceFloor
    }

    fn reduce_floor(&mut self) -> Phase {
        if self.radius.reduce_floor() {
            debug!(
                "rho reduced to {:.3e} after {} evaluations",
                self.radius.rho(),
                self.nf
            );
            self.nfsav = self.nf;
            return Phase::SolveSubproblem;
        }
        if self.mode == Mode::ShortStep {
            return Phase::FinalStep;
        }
        Phase::Terminate(Status::Converged)
    }
}
