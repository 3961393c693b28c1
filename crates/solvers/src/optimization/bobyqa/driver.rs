use log::warn;
use ndarray::Array1;

use super::{Bounds, Config, Error, radius::TrustRegion, state::ModelState};

/// Validates the inputs and allocates the solver state.
///
/// The initial radius shrinks to a third of the narrowest bound gap when
/// that gap is below twice the radius. Each start coordinate is then moved
/// onto its bound, or at least the initial radius away from it, so that the
/// initial interpolation points stay feasible.
///
/// # Errors
///
/// Returns an error, before any evaluation, if the dimension, the number of
/// interpolation points, or the start point is invalid.
pub(super) fn prepare<const N: usize>(
    x0: &[f64; N],
    bounds: &Bounds<N>,
    config: &Config,
) -> Result<(ModelState, TrustRegion), Error> {
    let npt = config.npt_for(N)?;
    if let Some(index) = x0.iter().position(|x| !x.is_finite()) {
        return Err(Error::InvalidStartPoint { index });
    }

    let mut rhobeg = config.initial_radius();
    let mut rhoend = config.stopping_radius();
    let min_gap = bounds.min_gap();
    if min_gap < rhobeg + rhobeg {
        rhobeg = min_gap / 3.0;
        rhoend = rhoend.min(rhobeg);
        warn!(
            "initial radius {:e} exceeds half the smallest bound gap {min_gap:e}, using {rhobeg:e}",
            config.initial_radius(),
        );
    }

    let lower = Array1::from(bounds.lower().to_vec());
    let upper = Array1::from(bounds.upper().to_vec());
    let mut xbase = Array1::<f64>::zeros(N);
    let mut sl = Array1::<f64>::zeros(N);
    let mut su = Array1::<f64>::zeros(N);
    for j in 0..N {
        let (xl, xu) = (lower[j], upper[j]);
        let gap = xu - xl;
        let mut x = x0[j];
        let mut lo = xl - x;
        let mut up = xu - x;
        if lo >= -rhobeg {
            if lo >= 0.0 {
                x = xl;
                lo = 0.0;
                up = gap;
            } else {
                x = xl + rhobeg;
                lo = -rhobeg;
                up = (xu - x).max(rhobeg);
            }
        } else if up <= rhobeg {
            if up <= 0.0 {
                x = xu;
                lo = -gap;
                up = 0.0;
            } else {
                x = xu - rhobeg;
                lo = (xl - x).min(-rhobeg);
                up = rhobeg;
            }
        }
        xbase[j] = x;
        sl[j] = lo;
        su[j] = up;
    }

    let state = ModelState::new(xbase, sl, su, lower, upper, npt);
    Ok((state, TrustRegion::new(rhobeg, rhoend)))
}
