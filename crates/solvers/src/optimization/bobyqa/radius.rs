/// The trust region radius `delta` and its floor `rho`.
///
/// `rho` only decreases, from the initial radius down to the stopping
/// radius, and `delta` never drops below `rho`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct TrustRegion {
    rho: f64,
    delta: f64,
    stopping: f64,
}

impl TrustRegion {
    pub(super) fn new(initial: f64, stopping: f64) -> Self {
        Self {
            rho: initial,
            delta: initial,
            stopping,
        }
    }

    pub(super) fn rho(&self) -> f64 {
        self.rho
    }

    pub(super) fn delta(&self) -> f64 {
        self.delta
    }

    /// Updates `delta` after a trust region step of length `dnorm` whose
    /// actual reduction was `ratio` times the predicted one.
    pub(super) fn after_step(&mut self, ratio: f64, dnorm: f64) {
        let half = 0.5 * self.delta;
        self.delta = if ratio <= 0.1 {
            half.min(dnorm)
        } else if ratio <= 0.7 {
            half.max(dnorm)
        } else {
            half.max(dnorm + dnorm)
        };
        self.snap_to_floor();
    }

    /// Shrinks `delta` before a geometry step toward a point at distance `dist`.
    pub(super) fn before_geometry_step(&mut self, dist: f64) {
        self.delta = (0.1 * self.delta).min(0.5 * dist);
        self.snap_to_floor();
    }

    /// Lowers `rho` toward the stopping radius.
    ///
    /// Returns `false`, leaving the radii unchanged, if `rho` is already at
    /// the stopping radius.
    pub(super) fn reduce_floor(&mut self) -> bool {
        if self.rho <= self.stopping {
            return false;
        }
        self.delta = 0.5 * self.rho;
        let ratio = self.rho / self.stopping;
        self.rho = if ratio <= 16.0 {
            self.stopping
        } else if ratio <= 250.0 {
            ratio.sqrt() * self.stopping
        } else {
            0.1 * self.rho
        };
        self.delta = self.delta.max(self.rho);
        true
    }

    fn snap_to_floor(&mut self) {
        if self.delta <= 1.5 * self.rho {
            self.delta = self.rho;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn floor_sequence() {
        let mut radius = TrustRegion::new(1.0, 1e-6);
        let mut floors = vec![radius.rho()];
        while radius.reduce_floor() {
            floors.push(radius.rho());
        }

        // Tenfold steps while far away, then a square root step, then the end.
        let expected = [1.0, 0.1, 0.01, 1e-3, 1e-4, 1e-5, 1e-6];
        assert_eq!(floors.len(), expected.len());
        for (actual, expected) in floors.iter().zip(expected) {
            assert_relative_eq!(*actual, expected, max_relative = 1e-12);
        }
        assert!(!radius.reduce_floor());
    }

    #[test]
    fn square_root_step_between_sixteen_and_250() {
        let mut radius = TrustRegion::new(1e-4, 1e-6);
        assert!(radius.reduce_floor());
        assert_relative_eq!(radius.rho(), 1e-5, max_relative = 1e-12);
        assert_relative_eq!(radius.delta(), 5e-5, max_relative = 1e-12);
    }

    #[test]
    fn small_delta_snaps_to_rho() {
        let mut radius = TrustRegion::new(1.0, 0.01);
        radius.reduce_floor();
        radius.after_step(0.05, 0.01);
        assert_eq!(radius.delta(), radius.rho());
    }

    #[test]
    fn successful_step_expands_delta() {
        let mut radius = TrustRegion::new(1.0, 0.01);
        radius.after_step(0.9, 1.0);
        assert_relative_eq!(radius.delta(), 2.0);

        radius.after_step(0.5, 0.2);
        assert_relative_eq!(radius.delta(), 1.0);
    }

    proptest! {
        #[test]
        fn delta_never_below_rho(
            steps in prop::collection::vec((-2.0..2.0_f64, 0.0..3.0_f64, 0..3_u8), 1..60),
        ) {
            let mut radius = TrustRegion::new(1.0, 1e-8);
            let mut last_rho = radius.rho();
            for (ratio, length, kind) in steps {
                match kind {
                    0 => radius.after_step(ratio, length),
                    1 => radius.before_geometry_step(length),
                    _ => {
                        radius.reduce_floor();
                    }
                }
                prop_assert!(radius.rho() <= radius.delta());
                prop_assert!(radius.rho() <= last_rho);
                last_rho = radius.rho();
            }
        }
    }
}
