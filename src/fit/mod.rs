//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate and subset the `(x, y)` pairs
//! - seed the exponential-inverse model (parallel `b` grid + log-linear)
//! - refine under box bounds and report residual-scaled covariance

pub mod fitter;
pub mod seed;

pub use fitter::*;
