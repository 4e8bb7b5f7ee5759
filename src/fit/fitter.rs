//! Least-squares fitting of a single `(x, y, model)` triple.
//!
//! Given:
//! - independent values `x_i` and observations `y_i`
//! - a model kind (affine or exponential-inverse)
//! - optional box bounds on `(a, b)`
//! - an optional subset rule applied before fitting
//!
//! we return the `(a, b)` minimizing `Σ (y_i − f(x_i; a, b))²` together with a
//! residual-scaled covariance estimate.
//!
//! The affine model is solved in closed form on centered sums, with an exact
//! active-set pass when bounds bind. The exponential-inverse model is seeded from a
//! log-linear regression and a `b` grid search, then refined by a bounded
//! Levenberg–Marquardt solver.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Bounds, FitQuality, FitResult, KELVIN_OFFSET, ModelKind, Subset};
use crate::error::{LabError, Result};
use crate::fit::seed::{Seed, grid_seed, log_linear_seed};
use crate::math::{LineMoments, LmSettings, ResidualProblem, minimize, residual_covariance};
use crate::models::{fill_jacobian_row, predict};

/// Residuals `f(x_i; p) − y_i` for one model kind.
struct CurveProblem<'a> {
    model: ModelKind,
    x: &'a [f64],
    y: &'a [f64],
}

impl ResidualProblem for CurveProblem<'_> {
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = [params[0], params[1]];
        DVector::from_iterator(
            self.x.len(),
            self.x
                .iter()
                .zip(self.y)
                .map(|(&xi, &yi)| predict(self.model, xi, &p) - yi),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        jacobian_at(self.model, self.x, [params[0], params[1]])
    }
}

fn jacobian_at(model: ModelKind, x: &[f64], params: [f64; 2]) -> DMatrix<f64> {
    let mut jac = DMatrix::<f64>::zeros(x.len(), 2);
    let mut row = [0.0; 2];
    for (i, &xi) in x.iter().enumerate() {
        fill_jacobian_row(model, xi, &params, &mut row);
        jac[(i, 0)] = row[0];
        jac[(i, 1)] = row[1];
    }
    jac
}

fn sse_at(model: ModelKind, x: &[f64], y: &[f64], params: [f64; 2]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - predict(model, xi, &params);
            r * r
        })
        .sum()
}

/// Fit `model` to `(x, y)`.
///
/// - `x` and `y` must have equal, non-zero length.
/// - `bounds` constrains `(a, b)`; `None` means unbounded.
/// - `subset` filters pairs before fitting and must keep at least `k + 1`
///   points; without a subset at least `k` points are required.
pub fn fit(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    bounds: Option<&Bounds>,
    subset: Option<&Subset>,
) -> Result<FitResult> {
    if x.len() != y.len() || x.is_empty() {
        return Err(LabError::ShapeMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }

    let bounds = bounds.copied().unwrap_or_default();
    if !bounds.is_valid() {
        return Err(LabError::Config(format!(
            "invalid bounds: lower={:?}, upper={:?}",
            bounds.lower, bounds.upper
        )));
    }

    let (xs, ys) = select(model, x, y, subset)?;
    validate_values(model, &xs, &ys)?;

    match model {
        ModelKind::Affine => fit_affine(&xs, &ys, &bounds),
        ModelKind::ExponentialInverse => fit_exponential(&xs, &ys, &bounds),
    }
}

/// Apply the subset rule and enforce the minimum point count.
fn select(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    subset: Option<&Subset>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let k = model.param_count();
    let (xs, ys, required): (Vec<f64>, Vec<f64>, usize) = match subset {
        None => (x.to_vec(), y.to_vec(), k),
        Some(rule) => {
            let (xs, ys) = x
                .iter()
                .zip(y)
                .enumerate()
                .filter(|&(i, (_, &yi))| rule.keeps(i, yi))
                .map(|(_, (&xi, &yi))| (xi, yi))
                .unzip();
            (xs, ys, k + 1)
        }
    };

    if xs.len() < required {
        return Err(LabError::InsufficientData {
            kept: xs.len(),
            required,
        });
    }
    Ok((xs, ys))
}

fn validate_values(model: ModelKind, x: &[f64], y: &[f64]) -> Result<()> {
    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(LabError::InvalidInput(format!("x[{i}] is not finite")));
    }
    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(LabError::InvalidInput(format!("y[{i}] is not finite")));
    }
    if model == ModelKind::ExponentialInverse {
        if let Some(i) = x.iter().position(|&v| v <= -KELVIN_OFFSET) {
            return Err(LabError::InvalidInput(format!(
                "x[{i}] = {} °C is at or below absolute zero",
                x[i]
            )));
        }
    }
    let first = x[0];
    if x.iter().all(|&v| v == first) {
        return Err(LabError::InvalidInput(format!(
            "all x values equal {first}; the slope is undetermined"
        )));
    }
    Ok(())
}

fn finish(model: ModelKind, x: &[f64], y: &[f64], params: [f64; 2], iterations: usize) -> FitResult {
    let sse = sse_at(model, x, y, params);
    let covariance = match model {
        ModelKind::Affine => LineMoments::new(x, y).covariance(sse),
        ModelKind::ExponentialInverse => {
            let cov = residual_covariance(&jacobian_at(model, x, params), sse);
            [[cov[(0, 0)], cov[(0, 1)]], [cov[(1, 0)], cov[(1, 1)]]]
        }
    };
    if covariance.iter().flatten().any(|v| v.is_infinite()) {
        log::warn!(
            "{} fit on {} point(s): covariance is undetermined",
            model.display_name(),
            x.len()
        );
    }

    let n = x.len();
    FitResult {
        model,
        params,
        covariance,
        quality: FitQuality {
            sse,
            rmse: (sse / n as f64).sqrt(),
            n,
            iterations,
        },
    }
}

fn fit_affine(x: &[f64], y: &[f64], bounds: &Bounds) -> Result<FitResult> {
    let model = ModelKind::Affine;
    let n = x.len();
    let moments = LineMoments::new(x, y);

    let mut params = moments
        .solve()
        .ok_or_else(|| LabError::InvalidInput("affine fit: x values have no spread".to_string()))?;

    if !bounds.contains(params) {
        log::debug!("affine: unconstrained optimum {params:?} violates bounds, searching active sets");
        params = bounded_affine(x, y, &moments, bounds);
    }

    log::debug!("affine fit on {n} point(s): a={:.6e}, b={:.6e}", params[0], params[1]);
    Ok(finish(model, x, y, params, 0))
}

/// Exact box-constrained affine least squares.
///
/// The objective is a convex quadratic in `(a, b)`; when the unconstrained
/// optimum lies outside the box, the constrained optimum lies on an edge.
/// On each edge the problem is one-dimensional, so the clamped 1-D optimum
/// is exact. Corners are covered by the clamping.
fn bounded_affine(x: &[f64], y: &[f64], moments: &LineMoments, bounds: &Bounds) -> [f64; 2] {
    let mut candidates = Vec::with_capacity(4);
    for a in [bounds.lower[0], bounds.upper[0]] {
        if a.is_finite() {
            let b = moments.intercept_for(a).clamp(bounds.lower[1], bounds.upper[1]);
            candidates.push([a, b]);
        }
    }
    for b in [bounds.lower[1], bounds.upper[1]] {
        if b.is_finite() {
            // Slope through the fixed intercept, Σx(y - b) / Σx², expanded around x̄.
            let sxx_raw = moments.sxx + moments.n as f64 * moments.x_mean * moments.x_mean;
            let sxy_raw = moments.sxy + moments.n as f64 * moments.x_mean * (moments.y_mean - b);
            let a = if sxx_raw > 0.0 { sxy_raw / sxx_raw } else { 0.0 };
            candidates.push([a.clamp(bounds.lower[0], bounds.upper[0]), b]);
        }
    }

    candidates
        .into_iter()
        .map(|p| (sse_at(ModelKind::Affine, x, y, p), p))
        .min_by(|(sa, _), (sb, _)| sa.total_cmp(sb))
        .map(|(_, p)| p)
        .unwrap_or_else(|| bounds.clamp([0.0, 0.0]))
}

fn fit_exponential(x: &[f64], y: &[f64], bounds: &Bounds) -> Result<FitResult> {
    let model = ModelKind::ExponentialInverse;

    let grid = grid_seed(x, y, bounds)?;
    let seed = match log_linear_seed(x, y, bounds) {
        Some(log_seed) if log_seed.sse <= grid.sse => log_seed,
        _ => grid,
    };
    log::debug!(
        "exponential seed: a={:.6e}, b={:.3} (sse={:.6e})",
        seed.params[0],
        seed.params[1],
        seed.sse
    );

    let y_energy: f64 = y.iter().map(|v| v * v).sum();
    let settings = LmSettings {
        sse_floor: y_energy * 1e-28,
        ..LmSettings::default()
    };

    let problem = CurveProblem { model, x, y };
    let Seed { params: start, .. } = seed;
    let outcome = minimize(
        &problem,
        &DVector::from_row_slice(&start),
        &bounds.lower,
        &bounds.upper,
        &settings,
    )
    .map_err(|failure| LabError::Convergence {
        model: model.display_name().to_string(),
        iterations: failure.iterations,
        reason: failure.reason,
    })?;

    let params = [outcome.params[0], outcome.params[1]];
    log::debug!(
        "exponential fit on {} point(s): a={:.6e}, b={:.3} after {} iteration(s)",
        x.len(),
        params[0],
        params[1],
        outcome.iterations
    );
    Ok(finish(model, x, y, params, outcome.iterations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn thermistor_series(a: f64, b: f64) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..16).map(|i| 18.0 + 5.0 * i as f64).collect();
        let y = x.iter().map(|&t| predict(ModelKind::ExponentialInverse, t, &[a, b])).collect();
        (x, y)
    }

    #[test]
    fn affine_recovers_noiseless_parameters() {
        let x = [-3.0, 0.5, 2.0, 7.5, 11.0];
        let y: Vec<f64> = x.iter().map(|v| -1.25 * v + 40.0).collect();
        let fit = fit(ModelKind::Affine, &x, &y, None, None).unwrap();
        assert_relative_eq!(fit.a(), -1.25, max_relative = 1e-10);
        assert_relative_eq!(fit.b(), 40.0, max_relative = 1e-10);
        assert_eq!(fit.quality.iterations, 0);
        assert!(fit.quality.sse < 1e-18);
    }

    #[test]
    fn affine_recovers_line_with_large_x_offset() {
        // Timestamp-like x: the raw [x, 1] design is badly conditioned.
        let x: Vec<f64> = (0..5).map(|i| 1e7 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 3.0).collect();
        let fit = fit(ModelKind::Affine, &x, &y, None, None).unwrap();
        assert_relative_eq!(fit.a(), 2.0, max_relative = 1e-12);
        assert_relative_eq!(fit.b(), -3.0, max_relative = 1e-9);
        assert!(fit.std_errors()[0].is_finite());
    }

    #[test]
    fn affine_recovers_line_on_tiny_x_scale() {
        let x: Vec<f64> = (1..=5).map(|i| i as f64 * 1e-13).collect();
        let y: Vec<f64> = x.iter().map(|v| 3e12 * v + 1.0).collect();
        let fit = fit(ModelKind::Affine, &x, &y, None, None).unwrap();
        assert_relative_eq!(fit.a(), 3e12, max_relative = 1e-9);
        assert_relative_eq!(fit.b(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn affine_covariance_matches_textbook_formulas() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.1, 0.9, 2.2, 2.8, 4.0];
        let fit = fit(ModelKind::Affine, &x, &y, None, None).unwrap();
        let s2 = fit.quality.sse / 3.0;
        let (x_mean, sxx) = (2.0, 10.0);
        assert_relative_eq!(fit.covariance[0][0], s2 / sxx, max_relative = 1e-12);
        assert_relative_eq!(fit.covariance[0][1], -x_mean * s2 / sxx, max_relative = 1e-12);
        assert_relative_eq!(fit.covariance[1][1], s2 * (1.0 / 5.0 + x_mean * x_mean / sxx), max_relative = 1e-12);
    }

    #[test]
    fn affine_bounds_with_offset_x() {
        // y = 2x - 5 around x = 1e6; the intercept is pinned at 0.
        let x: Vec<f64> = (0..6).map(|i| 1e6 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 5.0).collect();
        let fit = fit(ModelKind::Affine, &x, &y, Some(&Bounds::non_negative()), None).unwrap();
        assert_eq!(fit.b(), 0.0);
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        let sxx: f64 = x.iter().map(|v| v * v).sum();
        assert_relative_eq!(fit.a(), sxy / sxx, max_relative = 1e-9);
    }

    #[test]
    fn affine_with_two_points_has_undetermined_covariance() {
        let fit = fit(ModelKind::Affine, &[1.0, 3.0], &[2.0, 6.0], None, None).unwrap();
        assert_relative_eq!(fit.a(), 2.0, max_relative = 1e-12);
        assert!(fit.b().abs() < 1e-12);
        assert!(fit.covariance[0][0].is_infinite());
    }

    #[test]
    fn affine_bounds_pin_negative_intercept_to_zero() {
        // Unconstrained: y = 2x - 5. With b >= 0 the best line has b = 0.
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 5.0).collect();
        let fit = fit(ModelKind::Affine, &x, &y, Some(&Bounds::non_negative()), None).unwrap();
        assert_eq!(fit.b(), 0.0);
        // Through-origin slope: Σxy / Σx².
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        let sxx: f64 = x.iter().map(|v| v * v).sum();
        assert_relative_eq!(fit.a(), sxy / sxx, max_relative = 1e-12);
    }

    #[test]
    fn exponential_recovers_noiseless_parameters_within_bounds() {
        let (x, y) = thermistor_series(0.0176, 3950.0);
        let fit = fit(ModelKind::ExponentialInverse, &x, &y, Some(&Bounds::non_negative()), None).unwrap();
        assert_relative_eq!(fit.a(), 0.0176, max_relative = 1e-6);
        assert_relative_eq!(fit.b(), 3950.0, max_relative = 1e-6);
        assert!(Bounds::non_negative().contains(fit.params));
    }

    #[test]
    fn exponential_refines_beyond_the_log_linear_seed_on_noisy_data() {
        let (x, mut y) = thermistor_series(0.0176, 3950.0);
        for (i, v) in y.iter_mut().enumerate() {
            let wobble = if i % 2 == 0 { 1.004 } else { 0.996 };
            *v *= wobble;
        }
        let seed = log_linear_seed(&x, &y, &Bounds::non_negative()).unwrap();
        let fit = fit(ModelKind::ExponentialInverse, &x, &y, Some(&Bounds::non_negative()), None).unwrap();
        assert!(fit.quality.sse <= seed.sse);
        assert!((fit.b() - 3950.0).abs() / 3950.0 < 0.02);
        assert!(fit.std_errors()[1].is_finite());
    }

    #[test]
    fn exponential_with_negative_readings_uses_grid_seed() {
        // A small offset pushes one reading negative, so no log-linear seed exists.
        let (x, y) = thermistor_series(0.0176, 3950.0);
        let y_min = y.iter().copied().fold(f64::INFINITY, f64::min);
        let shifted: Vec<f64> = y.iter().map(|v| v - y_min - 1.0).collect();
        let fit = fit(ModelKind::ExponentialInverse, &x, &shifted, None, None).unwrap();
        assert!(fit.quality.sse.is_finite());
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = fit(ModelKind::Affine, &[1.0, 2.0, 3.0], &[1.0, 2.0], None, None).unwrap_err();
        assert!(matches!(err, LabError::ShapeMismatch { x_len: 3, y_len: 2 }));
    }

    #[test]
    fn empty_input_is_a_shape_mismatch() {
        let err = fit(ModelKind::Affine, &[], &[], None, None).unwrap_err();
        assert!(matches!(err, LabError::ShapeMismatch { .. }));
    }

    #[test]
    fn single_point_is_insufficient() {
        let err = fit(ModelKind::Affine, &[1.0], &[2.0], None, None).unwrap_err();
        assert!(matches!(err, LabError::InsufficientData { kept: 1, required: 2 }));
    }

    #[test]
    fn subset_must_keep_k_plus_one_points() {
        let x = [10.0, 20.0, 30.0, 40.0];
        let y = [20.0, 45.0, 60.0, 80.0];
        let err = fit(ModelKind::Affine, &x, &y, None, Some(&Subset::YAbove(50.0))).unwrap_err();
        assert!(matches!(err, LabError::InsufficientData { kept: 2, required: 3 }));

        let ok = fit(ModelKind::Affine, &x, &y, None, Some(&Subset::YAbove(40.0))).unwrap();
        assert_eq!(ok.quality.n, 3);
    }

    #[test]
    fn range_subset_fits_leading_points_only() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        // Last point is an outlier outside the fitted range.
        let y = [1.0, 3.0, 5.0, 7.0, 100.0];
        let fit = fit(ModelKind::Affine, &x, &y, None, Some(&Subset::Range { start: 0, end: 4 })).unwrap();
        assert_relative_eq!(fit.a(), 2.0, max_relative = 1e-10);
        assert_relative_eq!(fit.b(), 1.0, max_relative = 1e-10);
    }

    #[test]
    fn below_absolute_zero_is_rejected() {
        let err = fit(ModelKind::ExponentialInverse, &[-300.0, 20.0], &[1.0, 2.0], None, None).unwrap_err();
        assert!(matches!(err, LabError::InvalidInput(_)));
    }

    #[test]
    fn constant_x_is_rejected() {
        let err = fit(ModelKind::Affine, &[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0], None, None).unwrap_err();
        assert!(matches!(err, LabError::InvalidInput(_)));
    }
}
