//! Growth phase estimation.
//!
//! `Estimator::growth` runs the full pipeline on one curve:
//!
//! ```text
//! raw series
//!   -> drop missing values
//!   -> outlier removal          (outliers.rs)
//!   -> segment spline smoothing (smoothing.rs)
//!   -> derivative scan          (phases.rs)
//!   -> exponential fit / phase  (regression.rs)
//!   -> ranking                  (ranking.rs)
//! ```
//!
//! Degenerate inputs (too short, too sparse, flat) end the pipeline early with
//! a warning and whatever has been computed so far; they are not errors.

use tracing::{debug, info_span, warn, Span};

use crate::domain::{AnnotatedCurve, EstimatorConfig, GrowthPhase, RawGrowthPhase, TimeSeries};

pub mod outliers;
pub mod phases;
pub mod ranking;
pub mod regression;
pub mod smoothing;

pub use outliers::remove_outliers;
pub use phases::find_growth_phases;
pub use ranking::rank_phases;
pub use regression::{fit_exponential, ExponentialFit};
pub use smoothing::segment_spline_smoothing;

/// Rolling standard deviations beyond which a point is an outlier.
pub const OUTLIER_STD_MULTIPLIER: f64 = 3.0;

/// Fewer strictly positive points than this cannot describe growth.
const MIN_POSITIVE_POINTS: usize = 3;

/// Estimate the growth phases of `series` with `config`.
pub fn estimate(series: &TimeSeries, config: &EstimatorConfig, name: &str) -> AnnotatedCurve {
    Estimator::new(config.clone()).growth(series, name)
}

/// Configured growth phase estimator.
///
/// Cheap to build; one estimator can process any number of curves.
#[derive(Debug, Clone)]
pub struct Estimator {
    config: EstimatorConfig,
    span: Span,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let span = info_span!(
            "estimator",
            constrain_n0 = config.constrain_n0,
            segment_log_n0 = config.segment_log_n0
        );
        Self { config, span }
    }

    /// Annotate `series` (times in hours) with its outliers and ranked growth phases.
    pub fn growth(&self, series: &TimeSeries, name: &str) -> AnnotatedCurve {
        let span = info_span!(parent: &self.span, "growth", curve = name);
        let _guard = span.enter();

        let series = series.drop_missing();
        if series.is_empty() {
            return AnnotatedCurve::empty();
        }

        let window = match self.window_size(&series) {
            Some(w) => w,
            None => {
                warn!(curve = name, "not enough data points per hour to estimate growth");
                return AnnotatedCurve {
                    series,
                    ..AnnotatedCurve::empty()
                };
            }
        };

        let (series, outliers) = remove_outliers(&series, window, OUTLIER_STD_MULTIPLIER);
        debug!(window, outliers = outliers.len(), "outlier filter done");

        if series.count_above(0.0) < MIN_POSITIVE_POINTS {
            warn!(curve = name, "too few positive values to estimate growth");
            return early_exit(series, outliers);
        }

        let smooth = self.smooth(&series);
        if smooth.len() < window {
            warn!(
                curve = name,
                points = smooth.len(),
                window,
                "smoothed curve is shorter than the derivative window"
            );
            return early_exit(series, outliers);
        }

        let candidates = find_growth_phases(&smooth, window);
        debug!(candidates = candidates.len(), "raw growth phases");

        let fitted: Vec<GrowthPhase> = candidates
            .iter()
            .filter_map(|raw| self.fit_phase(&series, raw))
            .collect();

        let cutoff = self.config.phase_rank_exclude_below;
        let growth_phases: Vec<GrowthPhase> = rank_phases(&fitted, &self.config.phase_rank_weights, &self.config.rank_thresholds())
            .into_iter()
            .filter(|p| p.rank.is_some_and(|r| r >= cutoff))
            .collect();
        debug!(fitted = fitted.len(), kept = growth_phases.len(), "phases ranked");

        AnnotatedCurve {
            series,
            outliers,
            growth_phases,
        }
    }

    /// Odd sample count covering `curve_minimum_duration_hours`, or `None` when
    /// the curve is too sparse for any window.
    fn window_size(&self, series: &TimeSeries) -> Option<usize> {
        let per_hour = series.points_per_hour().unwrap_or(0.0);
        let hours = self.config.curve_minimum_duration_hours.max(1.0);
        let window = (per_hour * hours).round_ties_even();
        if !(window >= 1.0) {
            return None;
        }
        let window = window as usize;
        Some(if window % 2 == 0 { window + 1 } else { window })
    }

    fn smooth(&self, series: &TimeSeries) -> TimeSeries {
        if self.config.segment_log_n0 {
            let n0 = self.config.n0;
            let reference = series.map_values(|v| (v - n0).ln()).drop_missing();
            segment_spline_smoothing(series, &reference)
        } else {
            segment_spline_smoothing(series, series)
        }
    }

    fn fit_phase(&self, series: &TimeSeries, raw: &RawGrowthPhase) -> Option<GrowthPhase> {
        let slice = series.between(raw.start, raw.end);
        if slice.count_above(0.0) < MIN_POSITIVE_POINTS {
            debug!(start = raw.start, end = raw.end, "phase has too few positive points");
            return None;
        }
        if raw.duration() < self.config.min_phase_duration() {
            debug!(start = raw.start, end = raw.end, "phase too short");
            return None;
        }

        let n0 = self.config.constrain_n0.then_some(self.config.n0);
        let fit = fit_exponential(&slice, n0);
        if fit.used_fallback {
            debug!(start = raw.start, end = raw.end, "phase fitted with log-linear fallback");
        }

        // NaN fails both comparisons.
        if !(fit.slope >= self.config.min_phase_slope()) {
            debug!(slope = fit.slope, "phase slope below minimum");
            return None;
        }
        if !(fit.snr >= self.config.min_phase_snr()) {
            debug!(snr = fit.snr, "phase signal-to-noise ratio below minimum");
            return None;
        }

        Some(GrowthPhase {
            start: raw.start,
            end: raw.end,
            slope: fit.slope,
            intercept: fit.intercept,
            n0: fit.n0,
            snr: fit.snr,
            rank: None,
        })
    }
}

fn early_exit(series: TimeSeries, outliers: TimeSeries) -> AnnotatedCurve {
    AnnotatedCurve {
        series,
        outliers,
        growth_phases: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize, step: f64, f: impl Fn(f64) -> f64) -> TimeSeries {
        let times: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
        let values = times.iter().map(|&t| f(t)).collect();
        TimeSeries::new(times, values).unwrap()
    }

    #[test]
    fn window_is_odd_and_covers_the_minimum_duration() {
        let estimator = Estimator::new(EstimatorConfig::default());
        // 4 points/hour * 5 hours = 20 -> 21
        assert_eq!(estimator.window_size(&series(50, 0.25, |t| t)), Some(21));
        // 0.1 points/hour * 5 hours = 0.5 -> rounds to 0
        assert_eq!(estimator.window_size(&series(50, 10.0, |t| t)), None);
        // 1 point/hour: minimum duration below one hour is clamped up
        let short = Estimator::new(EstimatorConfig {
            curve_minimum_duration_hours: 0.2,
            ..EstimatorConfig::default()
        });
        assert_eq!(short.window_size(&series(50, 1.0, |t| t)), Some(1));
    }

    #[test]
    fn missing_values_are_dropped() {
        let times: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let mut values = vec![1.0; 8];
        values[3] = f64::NAN;
        let s = TimeSeries::new(times, values).unwrap();

        let result = estimate(&s, &EstimatorConfig::default(), "gaps");
        assert_eq!(result.series.len(), 7);
        assert!(result.growth_phases.is_empty());
    }

    #[test]
    fn non_positive_curves_exit_early() {
        let s = series(60, 0.25, |t| -1.0 - t);
        let result = estimate(&s, &EstimatorConfig::default(), "negative");
        assert!(result.growth_phases.is_empty());
        assert_eq!(result.series.len() + result.outliers.len(), 60);
    }

    #[test]
    fn strict_thresholds_remove_every_phase() {
        let s = series(100, 0.25, |t| (0.5 * t).exp());
        let config = EstimatorConfig {
            phase_minimum_slope: 5.0,
            ..EstimatorConfig::default()
        };
        assert!(estimate(&s, &config, "strict").growth_phases.is_empty());
    }
}
