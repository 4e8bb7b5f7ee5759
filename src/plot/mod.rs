//! Chart rendering.
//!
//! - `ascii`: fixed-grid terminal preview
//! - `chart`: labelled SVG charts (plotters)

pub mod ascii;
pub mod chart;

pub use ascii::*;
pub use chart::*;

use crate::domain::FitResult;

/// `n` evenly spaced values from `min` to `max` inclusive.
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    (0..n)
        .map(|i| min + (max - min) * i as f64 / (n as f64 - 1.0))
        .collect()
}

/// Sample a fitted model on `n` evenly spaced x values.
pub fn sample_fit(fit: &FitResult, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    linspace(x_min, x_max, n)
        .into_iter()
        .map(|x| (x, fit.predict(x)))
        .collect()
}

/// Finite `(min, max)` of the values, or `None` if there are none.
pub(crate) fn finite_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (min <= max).then_some((min, max))
}

/// Widen a range by `frac` of its span on each side (never to zero width).
pub(crate) fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = if span > 0.0 {
        span * frac
    } else {
        (min.abs() * frac).max(0.5)
    };
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let v = linspace(30.0, 80.0, 6);
        assert_eq!(v, vec![30.0, 40.0, 50.0, 60.0, 70.0, 80.0]);
    }

    #[test]
    fn finite_range_skips_non_finite() {
        assert_eq!(finite_range([3.0, f64::NAN, -1.0, f64::INFINITY]), Some((-1.0, 3.0)));
        assert_eq!(finite_range(std::iter::empty()), None);
    }

    #[test]
    fn pad_range_widens_degenerate_span() {
        let (lo, hi) = pad_range(5.0, 5.0, 0.05);
        assert!(lo < 5.0 && hi > 5.0);
    }
}
