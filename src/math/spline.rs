//! Interpolating cubic spline with not-a-knot end conditions.
//!
//! The spline passes exactly through every knot. Instead of forcing zero
//! curvature at the ends (natural spline), the third derivative is made
//! continuous across the second and second-to-last knots, so four knots taken
//! from a cubic reproduce that cubic exactly.
//!
//! Evaluation outside the knot range extrapolates the first/last polynomial piece.

use nalgebra::{DMatrix, DVector};

/// Minimum number of knots for a cubic spline.
pub const CUBIC_MIN_KNOTS: usize = 4;

#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit through `(xs[i], ys[i])`.
    ///
    /// Returns `None` for fewer than four knots, non-increasing `xs`, or a
    /// singular system.
    pub fn interpolate(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len();
        if n < CUBIC_MIN_KNOTS || ys.len() != n {
            return None;
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) || ys.iter().any(|y| !y.is_finite()) {
            return None;
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);

        // Not-a-knot at x1: (M1 - M0)/h0 == (M2 - M1)/h1.
        a[(0, 0)] = h[1];
        a[(0, 1)] = -(h[0] + h[1]);
        a[(0, 2)] = h[0];

        for i in 1..n - 1 {
            a[(i, i - 1)] = h[i - 1];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i];
            rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
        }

        // Not-a-knot at x_{n-2}.
        a[(n - 1, n - 3)] = h[n - 2];
        a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
        a[(n - 1, n - 1)] = h[n - 3];

        let m = a.lu().solve(&rhs)?;
        if m.iter().any(|v| !v.is_finite()) {
            return None;
        }

        Some(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m: m.iter().copied().collect(),
        })
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let n = self.xs.len();
        let k = self
            .xs
            .partition_point(|&x| x <= t)
            .saturating_sub(1)
            .min(n - 2);

        let (x0, x1) = (self.xs[k], self.xs[k + 1]);
        let (y0, y1) = (self.ys[k], self.ys[k + 1]);
        let (m0, m1) = (self.m[k], self.m[k + 1]);
        let h = x1 - x0;
        let left = x1 - t;
        let right = t - x0;

        m0 * left.powi(3) / (6.0 * h)
            + m1 * right.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * left
            + (y1 / h - m1 * h / 6.0) * right
    }

    pub fn evaluate_all(&self, ts: &[f64]) -> Vec<f64> {
        ts.iter().map(|&t| self.evaluate(t)).collect()
    }
}
