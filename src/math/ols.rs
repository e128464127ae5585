//! Least squares solvers.
//!
//! Two shapes of problem show up in the estimator:
//!
//! - straight-line fits `y = intercept + slope * x` (detrending, knot values,
//!   the log-linear fallback of the exponential fitter), solved in closed form
//! - small dense systems (Savitzky–Golay windows, Levenberg–Marquardt steps),
//!   solved with SVD
//!
//! The SVD path scales to tall matrices and degrades gracefully on
//! near-singular problems. (Nalgebra's `QR::solve` is intended for square
//! systems and will panic for non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Result of an ordinary straight-line regression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least squares line through `(x, y)`.
///
/// Returns `None` for fewer than two points or when `x` has no spread.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let x = &x[..n];
    let y = &y[..n];
    let x_bar = x.iter().sum::<f64>() / n as f64;
    let y_bar = y.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_bar;
        sxy += dx * (yi - y_bar);
        sxx += dx * dx;
    }
    if sxx <= 0.0 || !sxx.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    Some(LineFit {
        slope,
        intercept: y_bar - slope * x_bar,
    })
}

/// Remove the least-squares line from `values`, using sample positions as `x`.
///
/// Fewer than two values have no trend and come back centered on zero.
pub fn detrend(values: &[f64]) -> Vec<f64> {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    match fit_line(&x, values) {
        Some(line) => x
            .iter()
            .zip(values)
            .map(|(&xi, &yi)| yi - line.predict(xi))
            .collect(),
        None => vec![0.0; values.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_recovers_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 1.5 - 0.25 * v).collect();
        let line = fit_line(&x, &y).unwrap();
        assert!((line.slope + 0.25).abs() < 1e-12);
        assert!((line.intercept - 1.5).abs() < 1e-12);
    }

    #[test]
    fn fit_line_rejects_degenerate_x() {
        assert!(fit_line(&[1.0], &[2.0]).is_none());
        assert!(fit_line(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }

    #[test]
    fn detrend_removes_linear_drift() {
        let v: Vec<f64> = (0..6).map(|i| 10.0 + 2.0 * i as f64).collect();
        assert!(detrend(&v).iter().all(|r| r.abs() < 1e-12));
        assert_eq!(detrend(&[5.0]), vec![0.0]);
    }
}
