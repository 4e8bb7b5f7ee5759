//! Bounded Levenberg–Marquardt solver for small nonlinear least-squares problems.
//!
//! The solver minimizes `Σ r_i(p)^2` where the problem supplies residuals and
//! their Jacobian. Damping uses Marquardt's diagonal scaling so that parameters
//! of very different magnitude (a thermistor's `a ~ 1e-2` and `b ~ 4e3`) are
//! stepped sensibly. Box constraints are enforced by projecting every trial
//! point onto the bounds.

use nalgebra::{DMatrix, DVector};

/// A residual vector and its Jacobian, both functions of the parameters.
pub trait ResidualProblem {
    /// `r(p)`, one entry per observation.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// `∂r/∂p`, shape `(observations, params)`.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Debug, Clone)]
pub struct LmSettings {
    pub max_iters: usize,
    /// Stop when an accepted step reduces SSE by less than this fraction.
    pub ftol: f64,
    /// Stop when an accepted step moves every parameter less than `xtol * (|p| + xtol)`.
    pub xtol: f64,
    /// Stop when the gradient is orthogonal to the residual within this cosine.
    pub gtol: f64,
    /// Stop when SSE drops to this absolute level (exact fits).
    pub sse_floor: f64,
    pub lambda_init: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-12,
            xtol: 1e-10,
            gtol: 1e-10,
            sse_floor: 0.0,
            lambda_init: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub params: DVector<f64>,
    pub sse: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone)]
pub struct LmFailure {
    pub iterations: usize,
    pub reason: String,
}

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-300;

/// Gradient cosine accepted when damping is exhausted without progress.
const STALL_GTOL: f64 = 1e-6;

/// Minimize the problem's sum of squared residuals starting from `start`.
///
/// `lower` / `upper` must have the same length as `start`; use infinities for
/// unbounded parameters.
pub fn minimize<P: ResidualProblem>(
    problem: &P,
    start: &DVector<f64>,
    lower: &[f64],
    upper: &[f64],
    settings: &LmSettings,
) -> Result<LmOutcome, LmFailure> {
    let mut params = project(start, lower, upper);
    let mut residuals = problem.residuals(&params);
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(LmFailure {
            iterations: 0,
            reason: "residuals are not finite at the starting point".to_string(),
        });
    }

    let mut lambda = settings.lambda_init;

    for iter in 1..=settings.max_iters {
        let jac = problem.jacobian(&params);
        if sse <= settings.sse_floor
            || gradient_cosine(&jac, &residuals, &params, lower, upper) <= settings.gtol
        {
            log::debug!("lm: converged at iteration {iter} (sse={sse:.6e})");
            return Ok(LmOutcome {
                params,
                sse,
                iterations: iter - 1,
            });
        }

        let jtj = jac.transpose() * &jac;
        let neg_grad = -(jac.transpose() * &residuals);

        loop {
            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * jtj[(i, i)].max(DIAG_FLOOR);
            }

            let step = damped.cholesky().map(|c| c.solve(&neg_grad));
            if let Some(step) = step.filter(|s| s.iter().all(|v| v.is_finite())) {
                let trial = project(&(&params + &step), lower, upper);
                let trial_residuals = problem.residuals(&trial);
                let trial_sse = trial_residuals.norm_squared();
                if trial_sse.is_finite() && trial_sse < sse {
                    let reduction = (sse - trial_sse) / sse;
                    let small_step = is_small_step(&(&trial - &params), &params, settings.xtol);
                    params = trial;
                    residuals = trial_residuals;
                    sse = trial_sse;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    // Only accepted steps count towards convergence.
                    if reduction <= settings.ftol || small_step {
                        log::debug!("lm: converged after accepted step at iteration {iter} (sse={sse:.6e})");
                        return Ok(LmOutcome {
                            params,
                            sse,
                            iterations: iter,
                        });
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                let cosine = gradient_cosine(&jac, &residuals, &params, lower, upper);
                if cosine <= STALL_GTOL {
                    return Ok(LmOutcome {
                        params,
                        sse,
                        iterations: iter,
                    });
                }
                return Err(LmFailure {
                    iterations: iter,
                    reason: format!("damping exhausted without progress (gradient cosine {cosine:.3e})"),
                });
            }
        }
    }

    Err(LmFailure {
        iterations: settings.max_iters,
        reason: format!("iteration budget exhausted (sse={sse:.6e})"),
    })
}

fn project(params: &DVector<f64>, lower: &[f64], upper: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        params.len(),
        params
            .iter()
            .enumerate()
            .map(|(i, &p)| p.clamp(lower[i], upper[i])),
    )
}

fn is_small_step(step: &DVector<f64>, params: &DVector<f64>, xtol: f64) -> bool {
    step.iter()
        .zip(params.iter())
        .all(|(&d, &p)| d.abs() <= xtol * (p.abs() + xtol))
}

/// Largest cosine between a Jacobian column and the residual vector.
///
/// Zero means the gradient vanishes relative to the scale of the problem.
/// A parameter sitting on a bound whose descent direction points out of the
/// box contributes nothing.
fn gradient_cosine(
    jac: &DMatrix<f64>,
    residuals: &DVector<f64>,
    params: &DVector<f64>,
    lower: &[f64],
    upper: &[f64],
) -> f64 {
    let r_norm = residuals.norm();
    if r_norm == 0.0 {
        return 0.0;
    }
    jac.column_iter()
        .enumerate()
        .map(|(j, col)| {
            let c_norm = col.norm();
            // Descent moves p_j along -grad_j.
            let grad = col.dot(residuals);
            let blocked = (params[j] <= lower[j] && grad > 0.0) || (params[j] >= upper[j] && grad < 0.0);
            if c_norm == 0.0 || blocked {
                0.0
            } else {
                grad.abs() / (c_norm * r_norm)
            }
        })
        .fold(0.0, f64::max)
}
