use super::{
    event::Step,
    oracle::{Halt, Objective},
    state::ModelState,
};

/// Builds the initial interpolation set, quadratic model, and factorization.
///
/// The first point is `xbase`. The next `2n` points step by `±rhobeg` along
/// each coordinate, with the second step of a coordinate pushed inward when
/// the first one sits on a bound. Any remaining points combine two earlier
/// coordinate steps. Each point is evaluated exactly once, in order.
///
/// On return `kopt` and `xopt` mark the best point, but `gopt` is still the
/// model gradient at `xbase`.
///
/// # Errors
///
/// Propagates any [`Halt`] raised by the objective.
pub(super) fn initialize<O: Objective>(
    state: &mut ModelState,
    rhobeg: f64,
    objective: &mut O,
) -> Result<(), Halt> {
    let (n, npt) = (state.n(), state.npt());
    let rhosq = rhobeg * rhobeg;
    let recip = 1.0 / rhosq;

    let mut fbeg = 0.0;
    let mut stepa = 0.0;
    let mut stepb = 0.0;

    for k in 0..npt {
        // Place point `k`.
        let mut pair = None;
        if (1..=n).contains(&k) {
            let j = k - 1;
            stepa = if state.su[j] == 0.0 { -rhobeg } else { rhobeg };
            state.xpt[[k, j]] = stepa;
        } else if (n + 1..=2 * n).contains(&k) {
            let j = k - n - 1;
            stepa = state.xpt[[k - n, j]];
            stepb = -rhobeg;
            if state.sl[j] == 0.0 {
                stepb = (rhobeg + rhobeg).min(state.su[j]);
            }
            if state.su[j] == 0.0 {
                stepb = (-rhobeg - rhobeg).max(state.sl[j]);
            }
            state.xpt[[k, j]] = stepb;
        } else if k > 2 * n {
            // Pair coordinates (ipt, jpt), counted from one, cycling through
            // increasing offsets between them.
            let itemp = (k - n - 1) / n;
            let mut jpt = k - itemp * n - n;
            let mut ipt = jpt + itemp;
            if ipt > n {
                let swap = jpt;
                jpt = ipt - n;
                ipt = swap;
            }
            state.xpt[[k, ipt - 1]] = state.xpt[[ipt, ipt - 1]];
            state.xpt[[k, jpt - 1]] = state.xpt[[jpt, jpt - 1]];
            pair = Some((ipt, jpt));
        }

        let x = state.absolute(state.xpt.row(k));
        let f = objective.evaluate(&x, Step::Initial)?;
        state.fval[k] = f;
        if k == 0 {
            fbeg = f;
            state.kopt = 0;
        } else if f < state.fval[state.kopt] {
            state.kopt = k;
        }

        // Extend the model and the factorization to the new point.
        let kkt = &mut state.kkt;
        if (1..=n).contains(&k) {
            let j = k - 1;
            state.gopt[j] = (f - fbeg) / stepa;
            if npt < k + 1 + n {
                kkt.bmat[[0, j]] = -1.0 / stepa;
                kkt.bmat[[k, j]] = 1.0 / stepa;
                kkt.bmat[[npt + j, j]] = -0.5 * rhosq;
            }
        } else if (n + 1..=2 * n).contains(&k) {
            let j = k - n - 1;
            let temp = (f - fbeg) / stepb;
            let diff = stepb - stepa;
            state.hq.set(j, j, 2.0 * (temp - state.gopt[j]) / diff);
            state.gopt[j] = (state.gopt[j] * stepb - temp * stepa) / diff;

            // Keep the better of two straddling points as the first one,
            // since only it takes part in the combination points.
            if stepa * stepb < 0.0 && f < state.fval[k - n] {
                state.fval[k] = state.fval[k - n];
                state.fval[k - n] = f;
                if state.kopt == k {
                    state.kopt = k - n;
                }
                state.xpt[[k - n, j]] = stepb;
                state.xpt[[k, j]] = stepa;
            }

            kkt.bmat[[0, j]] = -(stepa + stepb) / (stepa * stepb);
            kkt.bmat[[k, j]] = -0.5 / state.xpt[[k - n, j]];
            kkt.bmat[[k - n, j]] = -kkt.bmat[[0, j]] - kkt.bmat[[k, j]];
            kkt.zmat[[0, j]] = std::f64::consts::SQRT_2 / (stepa * stepb);
            kkt.zmat[[k, j]] = std::f64::consts::FRAC_1_SQRT_2 / rhosq;
            kkt.zmat[[k - n, j]] = -kkt.zmat[[0, j]] - kkt.zmat[[k, j]];
        } else if let Some((ipt, jpt)) = pair {
            let col = k - n - 1;
            kkt.zmat[[0, col]] = recip;
            kkt.zmat[[k, col]] = recip;
            kkt.zmat[[ipt, col]] = -recip;
            kkt.zmat[[jpt, col]] = -recip;
            let temp = state.xpt[[k, ipt - 1]] * state.xpt[[k, jpt - 1]];
            state.hq.set(
                ipt - 1,
                jpt - 1,
                (fbeg - state.fval[ipt] - state.fval[jpt] + f) / temp,
            );
        }
    }

    let kopt = state.kopt;
    let best = state.xpt.row(kopt).to_owned();
    state.xopt.assign(&best);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::Array1;

    use crate::optimization::bobyqa::Error;

    struct Quadratic {
        calls: usize,
    }

    impl Objective for Quadratic {
        fn evaluate(&mut self, x: &[f64], _step: Step) -> Result<f64, Halt> {
            self.calls += 1;
            // (x0 - 1)² + 2(x1 + 0.5)² + x0·x1 + 3
            Ok((x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2) + x[0] * x[1] + 3.0)
        }
    }

    fn unbounded_state(npt: usize) -> ModelState {
        ModelState::new(
            Array1::from(vec![0.3, -0.2]),
            Array1::from_elem(2, -100.0),
            Array1::from_elem(2, 100.0),
            Array1::from_elem(2, -99.7),
            Array1::from_elem(2, 100.2),
            npt,
        )
    }

    #[test]
    fn consumes_exactly_npt_evaluations() {
        for npt in 4..=6 {
            let mut state = unbounded_state(npt);
            let mut objective = Quadratic { calls: 0 };
            initialize(&mut state, 0.5, &mut objective).expect("no halt");
            assert_eq!(objective.calls, npt);
        }
    }

    #[test]
    fn full_quadratic_model_interpolates() {
        let mut state = unbounded_state(6);
        let mut objective = Quadratic { calls: 0 };
        initialize(&mut state, 0.5, &mut objective).expect("no halt");
        state.recenter_gradient();

        assert!(state.interpolation_error() < 1e-12);
        // Six points determine the quadratic exactly.
        assert_relative_eq!(state.hq.get(0, 0), 2.0, epsilon = 1e-10);
        assert_relative_eq!(state.hq.get(1, 1), 4.0, epsilon = 1e-10);
        assert_relative_eq!(state.hq.get(0, 1), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn best_point_is_tracked() {
        let mut state = unbounded_state(5);
        let mut objective = Quadratic { calls: 0 };
        initialize(&mut state, 0.5, &mut objective).expect("no halt");

        let fopt = state.fopt();
        assert!(state.fval.iter().all(|&f| f >= fopt));
        assert_eq!(state.xopt, state.xpt.row(state.kopt));
    }

    #[test]
    fn second_step_moves_inward_from_a_bound() {
        // Start exactly on the lower bound of the first variable.
        let mut state = ModelState::new(
            Array1::from(vec![0.0, 0.0]),
            Array1::from(vec![0.0, -5.0]),
            Array1::from(vec![5.0, 5.0]),
            Array1::from(vec![0.0, -5.0]),
            Array1::from(vec![5.0, 5.0]),
            5,
        );
        let mut objective = Quadratic { calls: 0 };
        initialize(&mut state, 0.5, &mut objective).expect("no halt");

        assert_relative_eq!(state.xpt[[1, 0]], 0.5);
        assert_relative_eq!(state.xpt[[3, 0]], 1.0);
        assert!(state.xpt.column(0).iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn budget_halt_propagates() {
        struct Limited(usize);
        impl Objective for Limited {
            fn evaluate(&mut self, x: &[f64], _step: Step) -> Result<f64, Halt> {
                if self.0 == 0 {
                    return Err(Error::BudgetExceeded { max_evals: 3 }.into());
                }
                self.0 -= 1;
                Ok(x[0] + x[1])
            }
        }

        let mut state = unbounded_state(5);
        let result = initialize(&mut state, 0.5, &mut Limited(3));
        assert!(matches!(
            result,
            Err(Halt::Failed(Error::BudgetExceeded { max_evals: 3 }))
        ));
    }
}
