//! Exponential curve fitting.
//!
//! Model:
//!
//! ```text
//! N(t) = a * exp(b * t) + n0        a, b, n0 >= 0
//! ```
//!
//! with `n0` either fitted or fixed by the caller. The fit runs in linear space
//! with a bounded Levenberg–Marquardt solver:
//!
//! 1. start from `(a, b, n0) = (1, 0.01, 0)`
//! 2. if that fails to converge (or yields `b < 0`), regress `ln(N - n0)` on `t`
//!    and restart the nonlinear fit from the log-linear estimate
//! 3. if the restart fails too, report the log-linear estimate itself
//!
//! Non-convergence never escapes this module; callers judge fits by their
//! slope and signal-to-noise ratio.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::TimeSeries;
use crate::math::{fit_line, solve_least_squares, variance};

/// Cap on model evaluations per nonlinear fit.
const MAX_EVALUATIONS: usize = 10_000;

const INITIAL_AMPLITUDE: f64 = 1.0;
const INITIAL_RATE: f64 = 0.01;

/// Relative step size and cost reduction below which a fit has converged.
const XTOL: f64 = 1e-10;
const FTOL: f64 = 1e-10;
/// Cost (relative to `Σ y²`) treated as an exact fit.
const EXACT_FIT: f64 = 1e-24;

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-15;
/// Damping beyond which no step can lower the cost: the point is stationary.
const MAX_DAMPING: f64 = 1e16;

/// Outcome of [`fit_exponential`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialFit {
    /// Growth rate `b`.
    pub slope: f64,
    /// `ln(1/a) / b`: time at which `a * exp(b * t)` equals 1.
    pub intercept: f64,
    pub n0: f64,
    pub snr: f64,
    /// `true` when only the log-linear regression could be used.
    pub used_fallback: bool,
}

/// Fit `a * exp(b * t) + n0` to `series`, with `n0` fixed when given.
pub fn fit_exponential(series: &TimeSeries, n0: Option<f64>) -> ExponentialFit {
    fit_exponential_with_budget(series, n0, MAX_EVALUATIONS)
}

/// [`fit_exponential`] with `max_evaluations` model evaluations per nonlinear attempt.
fn fit_exponential_with_budget(series: &TimeSeries, n0: Option<f64>, max_evaluations: usize) -> ExponentialFit {
    let model = ExponentialModel { n0 };
    let times = series.times();
    let values = series.values();

    let initial = model.guess(INITIAL_AMPLITUDE, INITIAL_RATE);
    match levenberg_marquardt(&model, times, values, &initial, max_evaluations) {
        Some(params) if params[1] >= 0.0 => return model.summarize(series, &params),
        Some(params) => debug!(rate = params[1], "exponential fit has negative rate; retrying from log-linear guess"),
        None => debug!("exponential fit did not converge; retrying from log-linear guess"),
    }

    let floor = n0.unwrap_or(0.0);
    let log_series = series
        .filter(|s| s.value > floor)
        .map_values(|v| (v - floor).ln());
    let Some(line) = fit_line(log_series.times(), log_series.values()) else {
        debug!(points = log_series.len(), "too few points above baseline for log-linear fit");
        return ExponentialFit {
            slope: f64::NAN,
            intercept: f64::NAN,
            n0: floor,
            snr: f64::NAN,
            used_fallback: true,
        };
    };

    let guess = model.guess(line.intercept.exp(), line.slope);
    if let Some(params) = levenberg_marquardt(&model, times, values, &guess, max_evaluations) {
        return model.summarize(series, &params);
    }

    debug!(slope = line.slope, "nonlinear retry failed; using log-linear estimate");
    let linear = ExponentialModel { n0: Some(floor) };
    ExponentialFit {
        slope: line.slope,
        intercept: -line.intercept / line.slope,
        n0: floor,
        snr: signal_noise_ratio(series, |t| linear.predict(t, &[line.intercept.exp(), line.slope])),
        used_fallback: true,
    }
}

/// `var(fit) / var(observed - fit)` over the samples of `series`.
pub fn signal_noise_ratio(series: &TimeSeries, fit: impl Fn(f64) -> f64) -> f64 {
    let fitted: Vec<f64> = series.times().iter().map(|&t| fit(t)).collect();
    let residuals: Vec<f64> = series.values().iter().zip(&fitted).map(|(y, f)| y - f).collect();
    match (variance(&fitted), variance(&residuals)) {
        (Some(signal), Some(noise)) => signal / noise,
        _ => f64::NAN,
    }
}

/// Parameters are `[a, b]` with a fixed baseline, `[a, b, n0]` otherwise.
struct ExponentialModel {
    n0: Option<f64>,
}

impl ExponentialModel {
    fn guess(&self, amplitude: f64, rate: f64) -> Vec<f64> {
        match self.n0 {
            Some(_) => vec![amplitude, rate],
            None => vec![amplitude, rate, 0.0],
        }
    }

    fn baseline(&self, params: &[f64]) -> f64 {
        self.n0.unwrap_or_else(|| params[2])
    }

    fn predict(&self, t: f64, params: &[f64]) -> f64 {
        params[0] * (params[1] * t).exp() + self.baseline(params)
    }

    fn fill_jacobian_row(&self, t: f64, params: &[f64], row: &mut [f64]) {
        let e = (params[1] * t).exp();
        row[0] = e;
        row[1] = params[0] * t * e;
        if row.len() > 2 {
            row[2] = 1.0;
        }
    }

    fn summarize(&self, series: &TimeSeries, params: &[f64]) -> ExponentialFit {
        let (a, b) = (params[0], params[1]);
        ExponentialFit {
            slope: b,
            intercept: (1.0 / a).ln() / b,
            n0: self.baseline(params),
            snr: signal_noise_ratio(series, |t| self.predict(t, params)),
            used_fallback: false,
        }
    }
}

/// Residuals `model - observed` and their sum of squares.
fn residuals(model: &ExponentialModel, times: &[f64], values: &[f64], params: &[f64]) -> (Vec<f64>, f64) {
    let r: Vec<f64> = times
        .iter()
        .zip(values)
        .map(|(&t, &y)| model.predict(t, params) - y)
        .collect();
    let cost = r.iter().map(|v| v * v).sum();
    (r, cost)
}

/// Levenberg–Marquardt with every parameter bounded below by zero.
///
/// Bounds are handled with a simple active set: a parameter sitting on its
/// bound whose gradient points outwards is frozen for that step, and trial
/// points are projected back onto the feasible region.
///
/// Returns `None` when the evaluation cap is reached or the start is not finite.
fn levenberg_marquardt(
    model: &ExponentialModel,
    times: &[f64],
    values: &[f64],
    initial: &[f64],
    max_evaluations: usize,
) -> Option<Vec<f64>> {
    let n = times.len();
    let k = initial.len();
    if n == 0 {
        return None;
    }

    let mut params: Vec<f64> = initial.iter().map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 }).collect();
    let (mut r, mut cost) = residuals(model, times, values, &params);
    let mut evaluations = 1usize;
    if !cost.is_finite() {
        return None;
    }

    let exact_fit = EXACT_FIT * values.iter().map(|v| v * v).sum::<f64>();
    let mut damping = INITIAL_DAMPING;
    let mut row = vec![0.0; k];

    loop {
        if cost <= exact_fit {
            return Some(params);
        }

        let mut jac = DMatrix::<f64>::zeros(n, k);
        for (i, &t) in times.iter().enumerate() {
            model.fill_jacobian_row(t, &params, &mut row);
            for (j, &v) in row.iter().enumerate() {
                jac[(i, j)] = v;
            }
        }
        let r_vec = DVector::from_column_slice(&r);
        let grad = jac.transpose() * &r_vec;

        let free: Vec<usize> = (0..k).filter(|&j| !(params[j] <= 0.0 && grad[j] > 0.0)).collect();
        if free.is_empty() {
            return Some(params);
        }

        // Marquardt scaling: damp each direction relative to its own curvature.
        let column_norms: Vec<f64> = free.iter().map(|&j| jac.column(j).norm_squared()).collect();
        let norm_floor = column_norms.iter().copied().fold(0.0, f64::max) * 1e-12 + f64::MIN_POSITIVE;

        loop {
            if damping > MAX_DAMPING {
                return Some(params);
            }
            if evaluations >= max_evaluations {
                debug!(evaluations, "exponential fit hit its evaluation cap");
                return None;
            }

            // Solve [J; sqrt(λD)] δ = [-r; 0] in the least-squares sense.
            let f = free.len();
            let mut system = DMatrix::<f64>::zeros(n + f, f);
            let mut rhs = DVector::<f64>::zeros(n + f);
            for i in 0..n {
                for (c, &j) in free.iter().enumerate() {
                    system[(i, c)] = jac[(i, j)];
                }
                rhs[i] = -r[i];
            }
            for (c, norm) in column_norms.iter().enumerate() {
                system[(n + c, c)] = (damping * norm.max(norm_floor)).sqrt();
            }

            let Some(step) = solve_least_squares(&system, &rhs) else {
                damping *= 10.0;
                continue;
            };

            let mut trial = params.clone();
            for (c, &j) in free.iter().enumerate() {
                trial[j] = (params[j] + step[c]).max(0.0);
            }
            let (trial_r, trial_cost) = residuals(model, times, values, &trial);
            evaluations += 1;

            if trial_cost.is_finite() && trial_cost < cost {
                let step_norm = trial
                    .iter()
                    .zip(&params)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                let param_norm = trial.iter().map(|v| v * v).sum::<f64>().sqrt();
                let reduction = (cost - trial_cost) / cost;

                params = trial;
                r = trial_r;
                cost = trial_cost;
                damping = (damping * 0.3).max(MIN_DAMPING);

                if step_norm <= XTOL * (XTOL + param_norm) && reduction <= FTOL {
                    return Some(params);
                }
                break;
            }

            damping *= 10.0;
        }
    }
}
