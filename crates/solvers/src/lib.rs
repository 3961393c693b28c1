//! Derivative-free solvers built on the `dfo-core` abstractions.
//!
//! - [`optimization`]: minimize or maximize a scalar objective subject to
//!   bound constraints

pub mod optimization;
