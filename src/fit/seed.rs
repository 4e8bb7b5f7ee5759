//! Starting points for the exponential-inverse fit.
//!
//! For a fixed `b` the model `y = a * exp(b*u)` (with `u = 1/(x + 273.15)`)
//! is linear in `a`, so the best `a` has a closed form. We exploit that two
//! ways:
//!
//! - a log-linear regression `ln y = ln a + b*u` when every `y > 0`
//! - a deterministic grid search over `b` (log-spaced, both signs), with the
//!   closed-form `a` at each grid value
//!
//! The lowest-SSE candidate seeds the Levenberg–Marquardt refinement.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{Bounds, KELVIN_OFFSET};
use crate::error::{LabError, Result};
use crate::math::solve_least_squares;

/// Smallest and largest `|b|` (Kelvin) on the seed grid.
const B_GRID_MIN: f64 = 1.0;
const B_GRID_MAX: f64 = 1e5;
const B_GRID_STEPS: usize = 121;

/// A seed candidate: `[a, b]` and its SSE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub params: [f64; 2],
    pub sse: f64,
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(LabError::InvalidInput(format!(
            "invalid grid range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(LabError::InvalidInput("grid steps must be >= 2".to_string()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Candidate `b` values: zero plus log-spaced magnitudes of both signs,
/// restricted to the bounds.
pub fn b_grid(bounds: &Bounds) -> Result<Vec<f64>> {
    let magnitudes = log_space(B_GRID_MIN, B_GRID_MAX, B_GRID_STEPS)?;
    let mut grid = Vec::with_capacity(2 * magnitudes.len() + 1);
    grid.push(0.0);
    for &m in &magnitudes {
        grid.push(m);
        grid.push(-m);
    }
    grid.retain(|&b| b >= bounds.lower[1] && b <= bounds.upper[1]);
    if grid.is_empty() {
        // Narrow bounds that exclude every grid value: use the interval midpoint.
        let lo = bounds.lower[1].max(-B_GRID_MAX);
        let hi = bounds.upper[1].min(B_GRID_MAX);
        grid.push(0.5 * (lo + hi));
    }
    Ok(grid)
}

/// Best `a` (clamped to its bounds) and the SSE for a fixed `b`.
fn profile_sse(u: &[f64], y: &[f64], b: f64, bounds: &Bounds) -> Option<(f64, f64)> {
    let mut sgg = 0.0;
    let mut syg = 0.0;
    for (&ui, &yi) in u.iter().zip(y) {
        let g = (b * ui).exp();
        sgg += g * g;
        syg += yi * g;
    }
    if !(sgg.is_finite() && syg.is_finite()) || sgg == 0.0 {
        return None;
    }

    let a = (syg / sgg).clamp(bounds.lower[0], bounds.upper[0]);
    let sse: f64 = u
        .iter()
        .zip(y)
        .map(|(&ui, &yi)| {
            let r = yi - a * (b * ui).exp();
            r * r
        })
        .sum();
    sse.is_finite().then_some((a, sse))
}

/// Grid search over `b`; evaluated in parallel, selection is deterministic.
pub fn grid_seed(x: &[f64], y: &[f64], bounds: &Bounds) -> Result<Seed> {
    let u: Vec<f64> = x.iter().map(|&xi| 1.0 / (xi + KELVIN_OFFSET)).collect();
    let grid = b_grid(bounds)?;

    let candidates: Vec<(usize, Seed)> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &b)| {
            profile_sse(&u, y, b, bounds).map(|(a, sse)| {
                (
                    idx,
                    Seed {
                        params: [a, b],
                        sse,
                    },
                )
            })
        })
        .collect();

    // Pick the minimum SSE; break ties by original grid index.
    candidates
        .into_iter()
        .min_by(|(ia, a), (ib, b)| a.sse.total_cmp(&b.sse).then(ia.cmp(ib)))
        .map(|(_, seed)| seed)
        .ok_or_else(|| LabError::InvalidInput("no finite exponential seed on the b grid".to_string()))
}

/// Log-linear regression seed, available only when every `y > 0`.
pub fn log_linear_seed(x: &[f64], y: &[f64], bounds: &Bounds) -> Option<Seed> {
    if y.iter().any(|&v| v <= 0.0) {
        return None;
    }

    let n = x.len();
    let mut design = DMatrix::<f64>::zeros(n, 2);
    let mut ln_y = DVector::<f64>::zeros(n);
    for i in 0..n {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = 1.0 / (x[i] + KELVIN_OFFSET);
        ln_y[i] = y[i].ln();
    }

    let beta = solve_least_squares(&design, &ln_y)?;
    let params = bounds.clamp([beta[0].exp(), beta[1]]);
    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - params[0] * (params[1] / (xi + KELVIN_OFFSET)).exp();
            r * r
        })
        .sum();

    sse.is_finite().then_some(Seed { params, sse })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thermistor(a: f64, b: f64) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..10).map(|i| 20.0 + 8.0 * i as f64).collect();
        let y = x.iter().map(|&t| a * (b / (t + KELVIN_OFFSET)).exp()).collect();
        (x, y)
    }

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn b_grid_honours_non_negative_bounds() {
        let grid = b_grid(&Bounds::non_negative()).unwrap();
        assert!(grid.iter().all(|&b| b >= 0.0));
        assert!(grid.contains(&0.0));
    }

    #[test]
    fn log_linear_seed_is_exact_on_noiseless_data() {
        let (x, y) = thermistor(0.0176, 3950.0);
        let seed = log_linear_seed(&x, &y, &Bounds::non_negative()).unwrap();
        approx::assert_relative_eq!(seed.params[0], 0.0176, max_relative = 1e-7);
        approx::assert_relative_eq!(seed.params[1], 3950.0, max_relative = 1e-7);
    }

    #[test]
    fn log_linear_seed_requires_positive_y() {
        let (x, mut y) = thermistor(0.0176, 3950.0);
        y[3] = -1.0;
        assert!(log_linear_seed(&x, &y, &Bounds::unbounded()).is_none());
    }

    #[test]
    fn grid_seed_lands_near_true_b() {
        let (x, y) = thermistor(0.0176, 3950.0);
        let seed = grid_seed(&x, &y, &Bounds::non_negative()).unwrap();
        // Grid spacing is ~10% in |b|.
        assert!((seed.params[1] - 3950.0).abs() / 3950.0 < 0.1);
    }
}
