//! Model evaluation for the affine and exponential-inverse laws.
//!
//! The fitter relies on two primitive operations:
//! - predict `y(x)` given parameters (for residuals/plots)
//! - fill a Jacobian row `∂y/∂(a, b)` at `x` (for the nonlinear solver and covariance)

use crate::domain::{KELVIN_OFFSET, ModelKind};

/// Predict `y(x)` for the given model kind.
pub fn predict(model: ModelKind, x: f64, params: &[f64; 2]) -> f64 {
    let [a, b] = *params;
    match model {
        ModelKind::Affine => a * x + b,
        ModelKind::ExponentialInverse => a * (b / (x + KELVIN_OFFSET)).exp(),
    }
}

/// Fill `out` with the partial derivatives of `y(x)` with respect to `a` and `b`.
pub fn fill_jacobian_row(model: ModelKind, x: f64, params: &[f64; 2], out: &mut [f64; 2]) {
    match model {
        ModelKind::Affine => {
            out[0] = x;
            out[1] = 1.0;
        }
        ModelKind::ExponentialInverse => {
            let [a, b] = *params;
            let u = 1.0 / (x + KELVIN_OFFSET);
            let g = (b * u).exp();
            out[0] = g;
            out[1] = a * u * g;
        }
    }
}
