use thiserror::Error;

/// Configuration for the BOBYQA solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    initial_radius: f64,
    stopping_radius: f64,
    max_evals: usize,
    interpolation_points: Option<usize>,
}

/// Errors that can occur when validating a BOBYQA solver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("initial_radius must be finite and positive")]
    InitialRadius,

    #[error("stopping_radius must be finite, positive, and at most initial_radius")]
    StoppingRadius,

    #[error("max_evals must be positive")]
    MaxEvals,

    #[error("problem dimension is {n}, but at least 2 variables are required")]
    Dimension { n: usize },

    #[error("{npt} interpolation points requested, but the range is [{min}, {max}]")]
    InterpolationPoints { npt: usize, min: usize, max: usize },
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(1.0, 1e-6, 10_000).unwrap()
    }
}

impl Config {
    /// Creates a new config with validated radii and evaluation budget.
    ///
    /// The number of interpolation points defaults to `2n + 1`; use
    /// [`Config::with_interpolation_points`] to choose another value.
    ///
    /// # Errors
    ///
    /// Returns an error if a radius is non-finite or non-positive, if the
    /// stopping radius exceeds the initial radius, or if `max_evals` is zero.
    pub fn new(
        initial_radius: f64,
        stopping_radius: f64,
        max_evals: usize,
    ) -> Result<Self, ConfigError> {
        if !initial_radius.is_finite() || initial_radius <= 0.0 {
            return Err(ConfigError::InitialRadius);
        }
        if !stopping_radius.is_finite() || stopping_radius <= 0.0 || stopping_radius > initial_radius
        {
            return Err(ConfigError::StoppingRadius);
        }
        if max_evals == 0 {
            return Err(ConfigError::MaxEvals);
        }

        Ok(Self {
            initial_radius,
            stopping_radius,
            max_evals,
            interpolation_points: None,
        })
    }

    /// Sets the number of interpolation points.
    ///
    /// The value is checked against the problem dimension when the solver
    /// starts, since the valid range `[n + 2, (n + 1)(n + 2) / 2]` depends on it.
    #[must_use]
    pub fn with_interpolation_points(self, npt: usize) -> Self {
        Self {
            interpolation_points: Some(npt),
            ..self
        }
    }

    /// Returns the initial trust region radius.
    #[must_use]
    pub fn initial_radius(&self) -> f64 {
        self.initial_radius
    }

    /// Returns the trust region radius at which the search stops.
    #[must_use]
    pub fn stopping_radius(&self) -> f64 {
        self.stopping_radius
    }

    /// Returns the maximum number of objective evaluations.
    #[must_use]
    pub fn max_evals(&self) -> usize {
        self.max_evals
    }

    /// Returns the requested number of interpolation points, if any.
    #[must_use]
    pub fn interpolation_points(&self) -> Option<usize> {
        self.interpolation_points
    }

    /// Resolves and validates the number of interpolation points for `n` variables.
    pub(super) fn npt_for(&self, n: usize) -> Result<usize, ConfigError> {
        if n < 2 {
            return Err(ConfigError::Dimension { n });
        }

        let min = n + 2;
        let max = (n + 1) * (n + 2) / 2;
        let npt = self.interpolation_points.unwrap_or(2 * n + 1);

        if npt < min || npt > max {
            return Err(ConfigError::InterpolationPoints { npt, min, max });
        }
        Ok(npt)
    }
}
