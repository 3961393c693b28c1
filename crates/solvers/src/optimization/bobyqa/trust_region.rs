//! Approximate minimization of the quadratic model within the trust region
//! and the bounds.
//!
//! A truncated conjugate gradient pass runs first, fixing variables at their
//! bounds as it hits them. If the step reaches the trust region boundary, the
//! step is then improved by rotating it around the boundary one angle at a
//! time, still respecting the bounds.

use ndarray::Array1;

use super::state::ModelState;

/// What the subproblem solver learned about the model curvature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Curvature {
    /// The step ended on the trust region boundary.
    Boundary,

    /// The step ended inside the trust region, with the least positive
    /// curvature seen along a search direction, if any.
    Interior(Option<f64>),
}

/// A step from `xopt` that stays within the bounds.
#[derive(Debug, Clone)]
pub(super) struct TrustRegionStep {
    pub(super) xnew: Array1<f64>,
    pub(super) d: Array1<f64>,
    pub(super) dsq: f64,
    /// Model gradient at `xopt + d`.
    pub(super) gradient: Array1<f64>,
    pub(super) curvature: Curvature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Free,
    AtLower,
    AtUpper,
}

enum Exit {
    Interior(Option<f64>),
    Boundary,
}

struct Subproblem<'a> {
    state: &'a ModelState,
    activity: Vec<Activity>,
    nact: usize,
    d: Array1<f64>,
    gnew: Array1<f64>,
    s: Array1<f64>,
    delsq: f64,
    qred: f64,
}

/// Computes a step `d` that approximately minimizes the model subject to
/// `|d| <= delta` and `sl <= xopt + d <= su`.
pub(super) fn solve(state: &ModelState, delta: f64) -> TrustRegionStep {
    let n = state.n();
    let mut activity = vec![Activity::Free; n];
    let mut nact = 0;
    for i in 0..n {
        if state.xopt[i] <= state.sl[i] && state.gopt[i] >= 0.0 {
            activity[i] = Activity::AtLower;
        } else if state.xopt[i] >= state.su[i] && state.gopt[i] <= 0.0 {
            activity[i] = Activity::AtUpper;
        }
        if activity[i] != Activity::Free {
            nact += 1;
        }
    }

    let mut problem = Subproblem {
        state,
        activity,
        nact,
        d: Array1::zeros(n),
        gnew: state.gopt.clone(),
        s: Array1::zeros(n),
        delsq: delta * delta,
        qred: 0.0,
    };

    let curvature = match problem.conjugate_gradient() {
        Exit::Interior(least) => Curvature::Interior(least),
        Exit::Boundary => {
            problem.rotate_on_boundary();
            Curvature::Boundary
        }
    };
    problem.finish(curvature)
}

impl Subproblem<'_> {
    fn is_free(&self, i: usize) -> bool {
        self.activity[i] == Activity::Free
    }

    fn fix(&mut self, i: usize, side: Activity) {
        self.activity[i] = side;
        self.nact += 1;
    }

    fn conjugate_gradient(&mut self) -> Exit {
        let n = self.d.len();
        let state = self.state;
        let mut least_curvature: Option<f64> = None;
        let mut beta = 0.0;
        let mut gredsq = 0.0;
        let mut iterc = 0;
        let mut itermax = 0;

        loop {
            let mut stepsq = 0.0;
            for i in 0..n {
                self.s[i] = if !self.is_free(i) {
                    0.0
                } else if beta == 0.0 {
                    -self.gnew[i]
                } else {
                    beta * self.s[i] - self.gnew[i]
                };
                stepsq += self.s[i] * self.s[i];
            }
            if stepsq == 0.0 {
                return Exit::Interior(least_curvature);
            }
            if beta == 0.0 {
                gredsq = stepsq;
                itermax = iterc + n - self.nact;
            }
            if gredsq * self.delsq <= 1e-4 * self.qred * self.qred {
                return Exit::Interior(least_curvature);
            }

            let hs = state.hessian_times(self.s.view());

            let mut resid = self.delsq;
            let mut ds = 0.0;
            let mut shs = 0.0;
            for i in (0..n).filter(|&i| self.is_free(i)) {
                resid -= self.d[i] * self.d[i];
                ds += self.s[i] * self.d[i];
                shs += self.s[i] * hs[i];
            }
            if resid <= 0.0 {
                return Exit::Boundary;
            }

            let temp = (stepsq * resid + ds * ds).sqrt();
            let blen = if ds < 0.0 {
                (temp - ds) / stepsq
            } else {
                resid / (temp + ds)
            };
            let mut stplen = if shs > 0.0 {
                blen.min(gredsq / shs)
            } else {
                blen
            };

            let mut iact = None;
            for i in 0..n {
                if self.s[i] != 0.0 {
                    let xsum = state.xopt[i] + self.d[i];
                    let limit = if self.s[i] > 0.0 {
                        (state.su[i] - xsum) / self.s[i]
                    } else {
                        (state.sl[i] - xsum) / self.s[i]
                    };
                    if limit < stplen {
                        stplen = limit;
                        iact = Some(i);
                    }
                }
            }

            let mut sdec = 0.0;
            let mut ggsav = gredsq;
            if stplen > 0.0 {
                iterc += 1;
                let curvature = shs / stepsq;
                if iact.is_none() && curvature > 0.0 {
                    least_curvature =
                        Some(least_curvature.map_or(curvature, |c| c.min(curvature)));
                }
                ggsav = gredsq;
                gredsq = 0.0;
                for i in 0..n {
                    self.gnew[i] += stplen * hs[i];
                    if self.is_free(i) {
                        gredsq += self.gnew[i] * self.gnew[i];
                    }
                    self.d[i] += stplen * self.s[i];
                }
                sdec = (stplen * (ggsav - 0.5 * stplen * shs)).max(0.0);
                self.qred += sdec;
            }

            if let Some(i) = iact {
                let side = if self.s[i] < 0.0 {
                    Activity::AtLower
                } else {
                    Activity::AtUpper
                };
                self.fix(i, side);
                self.delsq -= self.d[i] * self.d[i];
                if self.delsq <= 0.0 {
                    return Exit::Boundary;
                }
                beta = 0.0;
                continue;
            }

            if stplen < blen {
                if iterc == itermax || sdec <= 0.01 * self.qred {
                    return Exit::Interior(least_curvature);
                }
                beta = gredsq / ggsav;
                continue;
            }

            return Exit::Boundary;
        }
    }

    /// Improves a step on the trust region boundary by rotating it in the
    /// plane of `d` and the reduced gradient.
    fn rotate_on_boundary(&mut self) {
        let n = self.d.len();
        let state = self.state;
        let mut hred = Array1::<f64>::zeros(n);

        'restart: loop {
            if self.nact + 1 >= n {
                return;
            }

            let mut dredsq = 0.0;
            let mut dredg = 0.0;
            let mut gredsq = 0.0;
            for i in 0..n {
                if self.is_free(i) {
                    dredsq += self.d[i] * self.d[i];
                    dredg += self.d[i] * self.gnew[i];
                    gredsq += self.gnew[i] * self.gnew[i];
                    self.s[i] = self.d[i];
                } else {
                    self.s[i] = 0.0;
                }
            }
            hred.assign(&state.hessian_times(self.s.view()));

            loop {
                let temp = gredsq * dredsq - dredg * dredg;
                if temp <= 1e-4 * self.qred * self.qred {
                    return;
                }
                let temp = temp.sqrt();
                for i in 0..n {
                    self.s[i] = if self.is_free(i) {
                        (dredg * self.d[i] - dredsq * self.gnew[i]) / temp
                    } else {
                        0.0
                    };
                }
                let sredg = -temp;

                // Largest rotation angle that keeps the free variables in bounds.
                let mut angbd = 1.0;
                let mut iact = None;
                let mut xsav = Activity::AtLower;
                for i in 0..n {
                    if !self.is_free(i) {
                        continue;
                    }
                    let tempa = state.xopt[i] + self.d[i] - state.sl[i];
                    let tempb = state.su[i] - state.xopt[i] - self.d[i];
                    if tempa <= 0.0 {
                        self.fix(i, Activity::AtLower);
                        continue 'restart;
                    }
                    if tempb <= 0.0 {
                        self.fix(i, Activity::AtUpper);
                        continue 'restart;
                    }
                    let ssq = self.d[i] * self.d[i] + self.s[i] * self.s[i];

                    let temp = ssq - (state.xopt[i] - state.sl[i]).powi(2);
                    if temp > 0.0 {
                        let temp = temp.sqrt() - self.s[i];
                        if angbd * temp > tempa {
                            angbd = tempa / temp;
                            iact = Some(i);
                            xsav = Activity::AtLower;
                        }
                    }
                    let temp = ssq - (state.su[i] - state.xopt[i]).powi(2);
                    if temp > 0.0 {
                        let temp = temp.sqrt() + self.s[i];
                        if angbd * temp > tempb {
                            angbd = tempb / temp;
                            iact = Some(i);
                            xsav = Activity::AtUpper;
                        }
                    }
                }

                let hs = state.hessian_times(self.s.view());
                let mut shs = 0.0;
                let mut dhs = 0.0;
                let mut dhd = 0.0;
                for i in (0..n).filter(|&i| self.is_free(i)) {
                    shs += self.s[i] * hs[i];
                    dhs += self.d[i] * hs[i];
                    dhd += self.d[i] * hred[i];
                }

                // Scan tan(θ/2) over a grid, then refine around the best value.
                let reduction = |angt: f64| {
                    let sth = (angt + angt) / (1.0 + angt * angt);
                    let curv = shs + angt * (angt * dhd - dhs - dhs);
                    sth * (angt * dredg - sredg - 0.5 * sth * curv)
                };
                let mut redmax = 0.0;
                let mut isav = 0;
                let mut redsav = 0.0;
                let mut rdprev = 0.0;
                let mut rdnext = 0.0;
                let mut angt = 0.0;
                let iu = (17.0 * angbd + 3.1) as usize;
                for i in 1..=iu {
                    angt = angbd * i as f64 / iu as f64;
                    let rednew = reduction(angt);
                    if rednew > redmax {
                        redmax = rednew;
                        isav = i;
                        rdprev = redsav;
                    } else if i == isav + 1 {
                        rdnext = rednew;
                    }
                    redsav = rednew;
                }
                if isav == 0 {
                    return;
                }
                if isav < iu {
                    let shift = (rdnext - rdprev) / (redmax + redmax - rdprev - rdnext);
                    angt = angbd * (isav as f64 + 0.5 * shift) / iu as f64;
                }

                let cth = (1.0 - angt * angt) / (1.0 + angt * angt);
                let sth = (angt + angt) / (1.0 + angt * angt);
                let sdec = reduction(angt);
                if sdec <= 0.0 {
                    return;
                }

                dredg = 0.0;
                gredsq = 0.0;
                for i in 0..n {
                    self.gnew[i] += (cth - 1.0) * hred[i] + sth * hs[i];
                    if self.is_free(i) {
                        self.d[i] = cth * self.d[i] + sth * self.s[i];
                        dredg += self.d[i] * self.gnew[i];
                        gredsq += self.gnew[i] * self.gnew[i];
                    }
                    hred[i] = cth * hred[i] + sth * hs[i];
                }
                self.qred += sdec;

                if let Some(i) = iact {
                    if isav == iu {
                        self.fix(i, xsav);
                        continue 'restart;
                    }
                }
                if sdec <= 0.2 * self.qred {
                    return;
                }
            }
        }
    }

    fn finish(self, curvature: Curvature) -> TrustRegionStep {
        let state = self.state;
        let n = self.d.len();
        let mut xnew = Array1::<f64>::zeros(n);
        let mut d = self.d;
        let mut dsq = 0.0;
        for i in 0..n {
            xnew[i] = match self.activity[i] {
                Activity::AtLower => state.sl[i],
                Activity::AtUpper => state.su[i],
                Activity::Free => (state.xopt[i] + d[i]).min(state.su[i]).max(state.sl[i]),
            };
            d[i] = xnew[i] - state.xopt[i];
            dsq += d[i] * d[i];
        }
        TrustRegionStep {
            xnew,
            d,
            dsq,
            gradient: self.gnew,
            curvature,
        }
    }
}
