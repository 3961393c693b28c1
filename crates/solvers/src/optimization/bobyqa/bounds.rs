use thiserror::Error;

/// Box constraints on the solver variables.
///
/// Each variable must satisfy `lower[i] <= x[i] <= upper[i]`. Infinite bounds
/// are allowed; the only requirement is that `lower[i] < upper[i]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<const N: usize> {
    lower: [f64; N],
    upper: [f64; N],
}

/// Errors that can occur when constructing [`Bounds`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BoundsError {
    #[error("bound {index} is NaN")]
    NotANumber { index: usize },

    #[error("lower bound {lower} is not below upper bound {upper} for variable {index}")]
    Inverted { index: usize, lower: f64, upper: f64 },
}

impl<const N: usize> Bounds<N> {
    /// Creates bounds from lower and upper limits.
    ///
    /// # Errors
    ///
    /// Returns an error if any bound is NaN or if `lower[i] >= upper[i]`.
    pub fn new(lower: [f64; N], upper: [f64; N]) -> Result<Self, BoundsError> {
        for index in 0..N {
            let (lo, up) = (lower[index], upper[index]);
            if lo.is_nan() || up.is_nan() {
                return Err(BoundsError::NotANumber { index });
            }
            if lo >= up {
                return Err(BoundsError::Inverted {
                    index,
                    lower: lo,
                    upper: up,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Creates bounds that leave every variable unconstrained.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            lower: [f64::NEG_INFINITY; N],
            upper: [f64::INFINITY; N],
        }
    }

    /// Returns the lower bounds.
    #[must_use]
    pub fn lower(&self) -> &[f64; N] {
        &self.lower
    }

    /// Returns the upper bounds.
    #[must_use]
    pub fn upper(&self) -> &[f64; N] {
        &self.upper
    }

    /// Returns the smallest `upper[i] - lower[i]`.
    pub(super) fn min_gap(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, up)| up - lo)
            .fold(f64::INFINITY, f64::min)
    }
}
