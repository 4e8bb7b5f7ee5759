//! Linear least squares and covariance helpers.
//!
//! The affine model is linear in `(a, b)`, so it is solved directly:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - A straight line is fitted on centered sums ([`LineMoments`]), so an x
//!   column with a large offset (timestamps) or a tiny scale stays well
//!   conditioned.
//! - General designs use an SVD solve with a cutoff relative to the largest
//!   singular value. (Nalgebra's `QR::solve` is intended for square systems
//!   and will panic for non-square matrices.)
//! - Covariance follows the residual-scaled convention
//!   `inv(JᵀJ) * SSE / (n - k)`.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Singular values below `eps · max(n, k) · σ_max` are treated as zero.
/// Returns `None` if the design is rank-deficient at that cutoff.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    if !(sigma_max > 0.0) {
        return None;
    }
    let tol = f64::EPSILON * x.nrows().max(x.ncols()) as f64 * sigma_max;
    if svd.singular_values.iter().any(|&s| s <= tol) {
        return None;
    }

    svd.solve(y, tol).ok().filter(|beta| beta.iter().all(|v| v.is_finite()))
}

/// Centered first and second moments of `(x, y)` pairs for `y = a·x + b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMoments {
    pub n: usize,
    pub x_mean: f64,
    pub y_mean: f64,
    /// `Σ (x - x̄)²`
    pub sxx: f64,
    /// `Σ (x - x̄)(y - ȳ)`
    pub sxy: f64,
}

impl LineMoments {
    pub fn new(x: &[f64], y: &[f64]) -> Self {
        let n = x.len().min(y.len());
        let mean = |v: &[f64]| v[..n].iter().sum::<f64>() / n as f64;
        let (x_mean, y_mean) = if n == 0 { (0.0, 0.0) } else { (mean(x), mean(y)) };
        let (sxx, sxy) = x
            .iter()
            .zip(y)
            .fold((0.0, 0.0), |(sxx, sxy), (&xi, &yi)| {
                let dx = xi - x_mean;
                (sxx + dx * dx, sxy + dx * (yi - y_mean))
            });
        Self {
            n,
            x_mean,
            y_mean,
            sxx,
            sxy,
        }
    }

    /// Unconstrained least-squares `(a, b)`; `None` when x has no spread.
    pub fn solve(&self) -> Option<[f64; 2]> {
        if !(self.sxx > 0.0) {
            return None;
        }
        let a = self.sxy / self.sxx;
        Some([a, self.intercept_for(a)])
    }

    /// Best intercept for a fixed slope.
    pub fn intercept_for(&self, a: f64) -> f64 {
        self.y_mean - a * self.x_mean
    }

    /// Residual-scaled covariance of `(a, b)`:
    /// `var a = s²/Sxx`, `var b = s²(1/n + x̄²/Sxx)`, `cov = -x̄·s²/Sxx`
    /// with `s² = SSE / (n - 2)`. All entries are `+inf` when undetermined.
    pub fn covariance(&self, sse: f64) -> [[f64; 2]; 2] {
        if self.n <= 2 || !(self.sxx > 0.0) {
            return [[f64::INFINITY; 2]; 2];
        }
        let s2 = sse / (self.n - 2) as f64;
        let var_a = s2 / self.sxx;
        let cov_ab = -self.x_mean * var_a;
        let var_b = s2 / self.n as f64 + self.x_mean * self.x_mean * var_a;
        [[var_a, cov_ab], [cov_ab, var_b]]
    }
}

/// Residual-scaled parameter covariance from a Jacobian evaluated at the optimum.
///
/// Entries are `+inf` when the fit is exactly determined (`n <= k`) or `JᵀJ`
/// cannot be inverted.
pub fn residual_covariance(jacobian: &DMatrix<f64>, sse: f64) -> DMatrix<f64> {
    let (n, k) = jacobian.shape();
    let undetermined = DMatrix::from_element(k, k, f64::INFINITY);
    if n <= k {
        return undetermined;
    }

    let jtj = jacobian.transpose() * jacobian;
    match jtj.try_inverse() {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => inv * (sse / (n - k) as f64),
        _ => undetermined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 3x + 2 on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-10);
        assert!((beta[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_cutoff_is_relative_to_the_largest_singular_value() {
        // Well conditioned, but every singular value is around 1e-13.
        let x = DMatrix::from_row_slice(3, 2, &[1e-13, 1e-13, 2e-13, 1e-13, 4e-13, 1e-13]);
        let y = DVector::from_row_slice(&[4e-13, 7e-13, 1.3e-12]);
        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-9);
        assert!((beta[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn least_squares_rejects_collinear_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }

    #[test]
    fn line_moments_survive_a_large_x_offset() {
        let x: Vec<f64> = (0..5).map(|i| 1e7 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 3.0).collect();
        let [a, b] = LineMoments::new(&x, &y).solve().unwrap();
        assert_eq!(a, 2.0);
        assert_eq!(b, -3.0);
    }

    #[test]
    fn line_covariance_matches_inverse_normal_matrix() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let mut rows = Vec::new();
        for &x in &xs {
            rows.extend_from_slice(&[x, 1.0]);
        }
        let j = DMatrix::from_row_slice(4, 2, &rows);
        let expected = residual_covariance(&j, 0.5);
        let cov = LineMoments::new(&xs, &[0.0; 4]).covariance(0.5);
        for r in 0..2 {
            for c in 0..2 {
                assert!((cov[r][c] - expected[(r, c)]).abs() < 1e-12);
            }
        }
        assert!(LineMoments::new(&xs[..2], &[0.0; 2]).covariance(0.0)[0][0].is_infinite());
    }

    #[test]
    fn covariance_is_infinite_when_exactly_determined() {
        let j = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 1.0]);
        let cov = residual_covariance(&j, 0.0);
        assert!(cov.iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn covariance_matches_textbook_slope_variance() {
        // For y = a x + b: var(a) = s^2 / Σ(x - x̄)^2.
        let xs = [0.0, 1.0, 2.0, 3.0];
        let mut rows = Vec::new();
        for &x in &xs {
            rows.extend_from_slice(&[x, 1.0]);
        }
        let j = DMatrix::from_row_slice(4, 2, &rows);
        let sse = 0.5;
        let cov = residual_covariance(&j, sse);
        let s2 = sse / 2.0;
        let sxx = 5.0; // Σ(x - 1.5)^2
        assert!((cov[(0, 0)] - s2 / sxx).abs() < 1e-12);
    }
}
