//! Savitzky–Golay derivative filter.
//!
//! Each output sample is the derivative of a least-squares polynomial fitted to
//! the `window` samples centered on it. Samples closer than half a window to
//! either edge reuse the polynomial of the first/last full window, evaluated at
//! their own offset (no padding, no reflection).
//!
//! Samples are assumed evenly spaced with unit step, so derivatives are "per
//! sample"; only their sign and relative size are meaningful for irregular input.

use nalgebra::DMatrix;

/// Derivative of order `deriv` of `values`, filtered with a polynomial of degree
/// `polyorder` over an odd `window`.
///
/// `polyorder` is clamped to `window - 1`. Returns `None` when the window is
/// even, zero, or longer than the input.
pub fn savgol_derivative(values: &[f64], window: usize, polyorder: usize, deriv: usize) -> Option<Vec<f64>> {
    let n = values.len();
    if window == 0 || window % 2 == 0 || window > n {
        return None;
    }
    let order = polyorder.min(window - 1);
    if deriv > order {
        return Some(vec![0.0; n]);
    }

    let half = window / 2;
    let projection = centered_projection(window, order)?;

    let mut out = Vec::with_capacity(n);
    let mut coefs = vec![0.0; order + 1];
    let mut fitted_center = usize::MAX;

    for i in 0..n {
        let center = i.clamp(half, n - 1 - half);
        if center != fitted_center {
            let window_values = &values[center - half..=center + half];
            for (k, c) in coefs.iter_mut().enumerate() {
                *c = projection
                    .row(k)
                    .iter()
                    .zip(window_values)
                    .map(|(p, v)| p * v)
                    .sum();
            }
            fitted_center = center;
        }
        let offset = i as f64 - center as f64;
        out.push(polynomial_derivative(&coefs, deriv, offset));
    }

    Some(out)
}

/// Pseudo-inverse of the Vandermonde matrix over offsets `-half..=half`.
///
/// Row `k` maps window values to the `k`-th polynomial coefficient.
fn centered_projection(window: usize, order: usize) -> Option<DMatrix<f64>> {
    let half = (window / 2) as f64;
    let vandermonde = DMatrix::from_fn(window, order + 1, |j, k| (j as f64 - half).powi(k as i32));
    vandermonde.pseudo_inverse(1e-12).ok()
}

/// `d`-th derivative of `Σ c_k x^k` at `x`.
fn polynomial_derivative(coefs: &[f64], d: usize, x: f64) -> f64 {
    coefs
        .iter()
        .enumerate()
        .skip(d)
        .map(|(k, &c)| {
            let falling: f64 = ((k - d + 1)..=k).map(|f| f as f64).product();
            c * falling * x.powi((k - d) as i32)
        })
        .sum()
}
