//! Geometry-improving replacement for an interpolation point.
//!
//! When point `knew` is to be replaced for geometry reasons, the new point
//! should make the Lagrange function of `knew` large in magnitude, since
//! that keeps the update denominator away from zero. Two candidates are
//! built: the best point on lines through `xopt` and the other interpolation
//! points, and a constrained Cauchy step of the Lagrange function.

use ndarray::Array1;

use super::state::ModelState;

const SHORTEN_LIMIT: f64 = 1.0 + std::f64::consts::SQRT_2;

/// Candidates for the replacement of interpolation point `knew`.
#[derive(Debug, Clone)]
pub(super) struct AlternativeMove {
    /// Best point found along lines through the interpolation points.
    pub(super) xnew: Array1<f64>,

    /// Constrained Cauchy step of the Lagrange function.
    pub(super) xalt: Array1<f64>,

    /// Diagonal element `knew` of `Z·Zᵀ`.
    pub(super) alpha: f64,

    /// Squared Lagrange value at `xalt`, or zero when no free direction exists.
    pub(super) cauchy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Snap {
    None,
    Lower(usize),
    Upper(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coordinate {
    Blocked,
    Free,
    Fixed,
}

/// Computes replacement candidates for point `knew` within distance `adelt`
/// of `xopt`.
pub(super) fn alternative_move(state: &ModelState, knew: usize, adelt: f64) -> AlternativeMove {
    let (n, npt) = (state.n(), state.npt());
    let xpt = &state.xpt;
    let xopt = &state.xopt;
    let (sl, su) = (&state.sl, &state.su);
    let zmat = &state.kkt.zmat;

    let mut hcol = Array1::<f64>::zeros(npt);
    for column in zmat.columns() {
        hcol.scaled_add(column[knew], &column);
    }
    let alpha = hcol[knew];
    let ha = 0.5 * alpha;

    // Gradient of the Lagrange function of `knew` at `xopt`.
    let mut glag = state.kkt.bmat.row(knew).to_owned();
    for k in 0..npt {
        let temp = hcol[k] * xpt.row(k).dot(xopt);
        glag.scaled_add(temp, &xpt.row(k));
    }

    let mut presav = 0.0;
    let mut ksav = knew;
    let mut stpsav = 0.0;
    let mut snap = Snap::None;
    for k in (0..npt).filter(|&k| k != state.kopt) {
        let mut dderiv = 0.0;
        let mut distsq = 0.0;
        for i in 0..n {
            let temp = xpt[[k, i]] - xopt[i];
            dderiv += glag[i] * temp;
            distsq += temp * temp;
        }

        let mut subd = adelt / distsq.sqrt();
        let mut slbd = -subd;
        let mut ilbd = Snap::None;
        let mut iubd = Snap::None;
        let sumin = subd.min(1.0);
        for i in 0..n {
            let temp = xpt[[k, i]] - xopt[i];
            if temp > 0.0 {
                if slbd * temp < sl[i] - xopt[i] {
                    slbd = (sl[i] - xopt[i]) / temp;
                    ilbd = Snap::Lower(i);
                }
                if subd * temp > su[i] - xopt[i] {
                    subd = sumin.max((su[i] - xopt[i]) / temp);
                    iubd = Snap::Upper(i);
                }
            } else if temp < 0.0 {
                if slbd * temp > su[i] - xopt[i] {
                    slbd = (su[i] - xopt[i]) / temp;
                    ilbd = Snap::Upper(i);
                }
                if subd * temp < sl[i] - xopt[i] {
                    subd = sumin.max((sl[i] - xopt[i]) / temp);
                    iubd = Snap::Lower(i);
                }
            }
        }

        // The Lagrange function restricted to the line is quadratic in the
        // step; for `knew` it is `t·(dderiv − t·diff)`, otherwise `t·(1 − t)`
        // scaled by `dderiv`.
        let (step, vlag, isbd) = if k == knew {
            let diff = dderiv - 1.0;
            let mut best = (slbd, slbd * (dderiv - slbd * diff), ilbd);
            let temp = subd * (dderiv - subd * diff);
            if temp.abs() > best.1.abs() {
                best = (subd, temp, iubd);
            }
            let tempd = 0.5 * dderiv;
            let tempa = tempd - diff * slbd;
            let tempb = tempd - diff * subd;
            if tempa * tempb < 0.0 {
                let temp = tempd * tempd / diff;
                if temp.abs() > best.1.abs() {
                    best = (tempd / diff, temp, Snap::None);
                }
            }
            best
        } else {
            let mut best = (slbd, slbd * (1.0 - slbd), ilbd);
            let temp = subd * (1.0 - subd);
            if temp.abs() > best.1.abs() {
                best = (subd, temp, iubd);
            }
            if subd > 0.5 && best.1.abs() < 0.25 {
                best = (0.5, 0.25, Snap::None);
            }
            (best.0, best.1 * dderiv, best.2)
        };

        let temp = step * (1.0 - step) * distsq;
        let predsq = vlag * vlag * (vlag * vlag + ha * temp * temp);
        if predsq > presav {
            presav = predsq;
            ksav = k;
            stpsav = step;
            snap = isbd;
        }
    }

    let mut xnew = Array1::<f64>::zeros(n);
    for i in 0..n {
        let temp = xopt[i] + stpsav * (xpt[[ksav, i]] - xopt[i]);
        xnew[i] = temp.min(su[i]).max(sl[i]);
    }
    match snap {
        Snap::Lower(i) => xnew[i] = sl[i],
        Snap::Upper(i) => xnew[i] = su[i],
        Snap::None => {}
    }

    let (xalt, cauchy) = cauchy_step(state, &hcol, glag, adelt);

    AlternativeMove {
        xnew,
        xalt,
        alpha,
        cauchy,
    }
}

/// Tries the constrained Cauchy step of the Lagrange function and of its
/// negation, keeping whichever gives the larger squared value.
fn cauchy_step(
    state: &ModelState,
    hcol: &Array1<f64>,
    mut glag: Array1<f64>,
    adelt: f64,
) -> (Array1<f64>, f64) {
    let Some(first) = cauchy_candidate(state, hcol, &glag, adelt, false) else {
        return (Array1::zeros(state.n()), 0.0);
    };
    glag.mapv_inplace(|g| -g);
    let Some(second) = cauchy_candidate(state, hcol, &glag, adelt, true) else {
        return (first.0, 0.0);
    };
    if first.1 > second.1 { first } else { second }
}

/// Steps from `xopt` along `-glag`, fixing coordinates that would leave the
/// bounds and rescaling the rest to length `adelt`.
///
/// Returns the point and the square of the predicted Lagrange value there,
/// or `None` if no coordinate can move.
fn cauchy_candidate(
    state: &ModelState,
    hcol: &Array1<f64>,
    glag: &Array1<f64>,
    adelt: f64,
    negated: bool,
) -> Option<(Array1<f64>, f64)> {
    let n = state.n();
    let xopt = &state.xopt;
    let (sl, su) = (&state.sl, &state.su);

    let mut w = Array1::<f64>::zeros(n);
    let mut coords = vec![Coordinate::Blocked; n];
    let mut wfixsq = 0.0;
    let mut ggfree = 0.0;
    for i in 0..n {
        let tempa = (xopt[i] - sl[i]).min(glag[i]);
        let tempb = (xopt[i] - su[i]).max(glag[i]);
        if tempa > 0.0 || tempb < 0.0 {
            coords[i] = Coordinate::Free;
            ggfree += glag[i] * glag[i];
        }
    }
    if ggfree == 0.0 {
        return None;
    }

    let mut step = 0.0;
    loop {
        let temp = adelt * adelt - wfixsq;
        if temp <= 0.0 {
            break;
        }
        let wsqsav = wfixsq;
        step = (temp / ggfree).sqrt();
        ggfree = 0.0;
        for i in 0..n {
            if coords[i] != Coordinate::Free {
                continue;
            }
            let temp = xopt[i] - step * glag[i];
            if temp <= sl[i] {
                coords[i] = Coordinate::Fixed;
                w[i] = sl[i] - xopt[i];
                wfixsq += w[i] * w[i];
            } else if temp >= su[i] {
                coords[i] = Coordinate::Fixed;
                w[i] = su[i] - xopt[i];
                wfixsq += w[i] * w[i];
            } else {
                ggfree += glag[i] * glag[i];
            }
        }
        if !(wfixsq > wsqsav && ggfree > 0.0) {
            break;
        }
    }

    let mut xalt = Array1::<f64>::zeros(n);
    let mut gw = 0.0;
    for i in 0..n {
        if coords[i] == Coordinate::Free {
            w[i] = -step * glag[i];
            xalt[i] = (xopt[i] + w[i]).min(su[i]).max(sl[i]);
        } else if w[i] == 0.0 {
            xalt[i] = xopt[i];
        } else if glag[i] > 0.0 {
            xalt[i] = sl[i];
        } else {
            xalt[i] = su[i];
        }
        gw += glag[i] * w[i];
    }

    let mut curv: f64 = (0..state.npt())
        .map(|k| {
            let temp = state.xpt.row(k).dot(&w);
            hcol[k] * temp * temp
        })
        .sum();
    if negated {
        curv = -curv;
    }

    // Shorten the step when the Lagrange function peaks before its end.
    let cauchy = if curv > -gw && curv < -SHORTEN_LIMIT * gw {
        let scale = -gw / curv;
        for i in 0..n {
            xalt[i] = (xopt[i] + scale * w[i]).min(su[i]).max(sl[i]);
        }
        (0.5 * gw * scale).powi(2)
    } else {
        (gw + 0.5 * curv).powi(2)
    };

    Some((xalt, cauchy))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::optimization::bobyqa::{
        event::Step,
        init::initialize,
        oracle::{Halt, Objective},
    };

    struct Bowl;

    impl Objective for Bowl {
        fn evaluate(&mut self, x: &[f64], _step: Step) -> Result<f64, Halt> {
            Ok((x[0] - 0.3).powi(2) + 3.0 * (x[1] + 0.2).powi(2) + x[0] * x[1])
        }
    }

    fn initialized_state() -> ModelState {
        // The first variable starts on its lower bound.
        let mut state = ModelState::new(
            Array1::from(vec![0.0, 0.5]),
            Array1::from(vec![0.0, -2.5]),
            Array1::from(vec![2.0, 1.5]),
            Array1::from(vec![0.0, -2.0]),
            Array1::from(vec![2.0, 2.0]),
            5,
        );
        initialize(&mut state, 0.5, &mut Bowl).expect("no halt");
        state.recenter_gradient();
        state
    }

    #[test]
    fn candidates_stay_feasible_and_within_reach() {
        let state = initialized_state();
        let adelt = 0.4;
        for knew in (0..state.npt()).filter(|&k| k != state.kopt) {
            let candidate = alternative_move(&state, knew, adelt);

            let step = &candidate.xnew - &state.xopt;
            assert!(step.dot(&step).sqrt() <= adelt * (1.0 + 1e-12));
            for i in 0..2 {
                assert!(candidate.xnew[i] >= state.sl[i] && candidate.xnew[i] <= state.su[i]);
                assert!(candidate.xalt[i] >= state.sl[i] && candidate.xalt[i] <= state.su[i]);
            }
            assert!(candidate.alpha > 0.0);
            assert!(candidate.cauchy >= 0.0);
        }
    }

    #[test]
    fn chosen_point_keeps_the_lagrange_function_away_from_zero() {
        let state = initialized_state();
        let knew = (0..state.npt()).find(|&k| k != state.kopt).unwrap_or(1);
        let candidate = alternative_move(&state, knew, 0.4);

        let d = &candidate.xnew - &state.xopt;
        let lagrange = state.lagrange_values(d.view());
        assert!(lagrange.vlag[knew].abs() > 1e-3);
    }
}
