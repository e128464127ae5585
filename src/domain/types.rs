//! Shared domain types.
//!
//! These types are intentionally kept lightweight, immutable once built, and
//! serializable so they can be:
//!
//! - passed between pipeline stages without copying semantics surprises
//! - exported to JSON/TSV
//! - rendered by the terminal plot

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::median;

/// One observation of a growth curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// An ordered `(time, value)` series.
///
/// Times are strictly increasing. Values may be `NaN` (missing) until
/// [`TimeSeries::drop_missing`] has been applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, validating lengths and time ordering.
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Result<Self, AppError> {
        if times.len() != values.len() {
            return Err(AppError::new(
                2,
                format!(
                    "Time/value length mismatch: {} times, {} values.",
                    times.len(),
                    values.len()
                ),
            ));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(AppError::new(2, "Time values must be finite."));
        }
        if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(AppError::new(
                2,
                format!(
                    "Times must be strictly increasing (t[{}]={} is followed by {}).",
                    i,
                    times[i],
                    times[i + 1]
                ),
            ));
        }
        Ok(Self { times, values })
    }

    /// Build a series from parts already known to be ordered.
    pub(crate) fn from_sorted(times: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self { times, values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_time(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(self.values.iter())
            .map(|(&time, &value)| Sample { time, value })
    }

    /// Keep only the samples matching `keep`.
    pub fn filter(&self, mut keep: impl FnMut(Sample) -> bool) -> Self {
        let (times, values): (Vec<f64>, Vec<f64>) = self
            .iter()
            .filter(|s| keep(*s))
            .map(|s| (s.time, s.value))
            .unzip();
        Self::from_sorted(times, values)
    }

    /// Drop missing (non-finite) values.
    pub fn drop_missing(&self) -> Self {
        self.filter(|s| s.value.is_finite())
    }

    /// Samples with `start <= time <= end` (both ends inclusive).
    pub fn between(&self, start: f64, end: f64) -> Self {
        let lo = self.times.partition_point(|&t| t < start);
        let hi = self.times.partition_point(|&t| t <= end).max(lo);
        Self::from_sorted(self.times[lo..hi].to_vec(), self.values[lo..hi].to_vec())
    }

    /// Apply `f` to every value, keeping times.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::from_sorted(self.times.clone(), self.values.iter().map(|&v| f(v)).collect())
    }

    /// Number of samples with a value strictly above `floor`.
    pub fn count_above(&self, floor: f64) -> usize {
        self.values.iter().filter(|&&v| v > floor).count()
    }

    /// Sampling density estimated from the median time step.
    ///
    /// Returns `None` for fewer than two samples.
    pub fn points_per_hour(&self) -> Option<f64> {
        let deltas: Vec<f64> = self.times.windows(2).map(|w| w[1] - w[0]).collect();
        let step = median(&deltas)?;
        Some(1.0 / step)
    }
}

/// Time unit of an input series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hours,
    Minutes,
}

impl TimeUnit {
    fn per_hour(self) -> f64 {
        match self {
            TimeUnit::Hours => 1.0,
            TimeUnit::Minutes => 60.0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hours" | "hour" | "h" => Ok(TimeUnit::Hours),
            "minutes" | "minute" | "min" => Ok(TimeUnit::Minutes),
            other => Err(AppError::config(format!(
                "Unsupported time unit '{other}' (expected 'hours' or 'minutes')."
            ))),
        }
    }
}

/// Convert a series to hours, the unit every estimator threshold is expressed in.
pub fn normalize_time_unit(series: &TimeSeries, unit: TimeUnit) -> TimeSeries {
    match unit {
        TimeUnit::Hours => series.clone(),
        TimeUnit::Minutes => {
            let per_hour = unit.per_hour();
            TimeSeries::from_sorted(
                series.times.iter().map(|&t| t / per_hour).collect(),
                series.values.clone(),
            )
        }
    }
}

/// A candidate interval found by the derivative scan, before fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawGrowthPhase {
    pub start: f64,
    pub end: f64,
}

impl RawGrowthPhase {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Metrics a growth phase can be ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseMetric {
    #[serde(rename = "SNR")]
    Snr,
    #[serde(rename = "duration")]
    Duration,
    #[serde(rename = "slope")]
    Slope,
}

impl PhaseMetric {
    pub fn name(self) -> &'static str {
        match self {
            PhaseMetric::Snr => "SNR",
            PhaseMetric::Duration => "duration",
            PhaseMetric::Slope => "slope",
        }
    }
}

impl fmt::Display for PhaseMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhaseMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snr" => Ok(PhaseMetric::Snr),
            "duration" => Ok(PhaseMetric::Duration),
            "slope" => Ok(PhaseMetric::Slope),
            other => Err(AppError::config(format!(
                "Unknown phase metric '{other}' (expected SNR, duration or slope)."
            ))),
        }
    }
}

/// Per-metric values (weights or thresholds).
pub type MetricMap = BTreeMap<PhaseMetric, f64>;

/// A fitted growth phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPhase {
    pub start: f64,
    pub end: f64,
    /// Exponential growth rate (per hour).
    pub slope: f64,
    /// Time at which the exponential term `a * exp(slope * t)` equals 1.
    pub intercept: f64,
    pub n0: f64,
    #[serde(rename = "SNR")]
    pub snr: f64,
    /// Composite score in `[0, 100]`; `None` until ranked.
    pub rank: Option<f64>,
}

impl GrowthPhase {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn metric(&self, metric: PhaseMetric) -> f64 {
        match metric {
            PhaseMetric::Snr => self.snr,
            PhaseMetric::Duration => self.duration(),
            PhaseMetric::Slope => self.slope,
        }
    }

    /// Copy of this phase with `rank` set.
    pub fn with_rank(&self, rank: f64) -> Self {
        Self {
            rank: Some(rank),
            ..*self
        }
    }

    /// Evaluate the fitted model `a * exp(slope * t) + n0` at `t`.
    pub fn predict(&self, t: f64) -> f64 {
        // intercept = ln(1/a) / slope, so a * exp(slope * t) = exp(slope * (t - intercept)).
        (self.slope * (t - self.intercept)).exp() + self.n0
    }
}

/// Final output of a growth estimation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedCurve {
    /// The cleaned series (outliers removed once that stage has run).
    pub series: TimeSeries,
    pub outliers: TimeSeries,
    /// Best first, already filtered by minimum rank.
    pub growth_phases: Vec<GrowthPhase>,
}

impl AnnotatedCurve {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The highest-ranked phase, if any survived.
    pub fn best_phase(&self) -> Option<&GrowthPhase> {
        let rank_of = |p: &GrowthPhase| p.rank.unwrap_or(f64::NEG_INFINITY);
        let mut best: Option<&GrowthPhase> = None;
        for phase in &self.growth_phases {
            match best {
                Some(b) if rank_of(phase) <= rank_of(b) => {}
                _ => best = Some(phase),
            }
        }
        best
    }
}

/// Estimator configuration.
///
/// All durations are in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Segment the curve on `ln(N - n0)` instead of `N`.
    pub segment_log_n0: bool,
    /// Fix the baseline of every fitted phase to `n0`.
    pub constrain_n0: bool,
    pub n0: f64,

    pub curve_minimum_duration_hours: f64,
    pub phase_minimum_signal_noise_ratio: f64,
    pub phase_minimum_duration_hours: f64,
    pub phase_minimum_slope: f64,

    /// Phases ranked below this score (0–100) are dropped.
    pub phase_rank_exclude_below: f64,
    pub phase_rank_weights: MetricMap,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            segment_log_n0: false,
            constrain_n0: false,
            n0: 0.0,
            curve_minimum_duration_hours: 5.0,
            phase_minimum_signal_noise_ratio: 1.0,
            phase_minimum_duration_hours: 1.5,
            phase_minimum_slope: 0.005,
            phase_rank_exclude_below: 33.0,
            phase_rank_weights: MetricMap::from([
                (PhaseMetric::Snr, 50.0),
                (PhaseMetric::Duration, 30.0),
                (PhaseMetric::Slope, 10.0),
            ]),
        }
    }
}

impl EstimatorConfig {
    /// Reject configurations the estimator cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        let numbers = [
            ("n0", self.n0),
            ("curve_minimum_duration_hours", self.curve_minimum_duration_hours),
            ("phase_minimum_signal_noise_ratio", self.phase_minimum_signal_noise_ratio),
            ("phase_minimum_duration_hours", self.phase_minimum_duration_hours),
            ("phase_minimum_slope", self.phase_minimum_slope),
            ("phase_rank_exclude_below", self.phase_rank_exclude_below),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(AppError::config(format!("{name} must be finite (got {value}).")));
            }
        }

        if self.phase_rank_weights.is_empty() {
            return Err(AppError::config("At least one phase rank weight is required."));
        }
        for (metric, &weight) in &self.phase_rank_weights {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(AppError::config(format!(
                    "Rank weight for {metric} must be a non-negative number (got {weight})."
                )));
            }
        }
        if self.phase_rank_weights.values().sum::<f64>() <= 0.0 {
            return Err(AppError::config("Phase rank weights must not all be zero."));
        }

        Ok(())
    }

    /// Minimum acceptable value per metric, used to anchor the ranking scale.
    pub fn rank_thresholds(&self) -> MetricMap {
        MetricMap::from([
            (PhaseMetric::Duration, self.min_phase_duration()),
            (PhaseMetric::Slope, self.min_phase_slope()),
            (PhaseMetric::Snr, self.min_phase_snr()),
        ])
    }

    pub fn min_phase_duration(&self) -> f64 {
        self.phase_minimum_duration_hours.max(0.0)
    }

    pub fn min_phase_slope(&self) -> f64 {
        self.phase_minimum_slope.max(0.0)
    }

    pub fn min_phase_snr(&self) -> f64 {
        self.phase_minimum_signal_noise_ratio.max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_unordered_times() {
        assert!(TimeSeries::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]).is_err());
        assert!(TimeSeries::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(TimeSeries::new(vec![0.0, 0.5, 1.0], vec![1.0, f64::NAN, 3.0]).is_ok());
    }

    #[test]
    fn between_is_inclusive() {
        let s = TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0], vec![10.0, 11.0, 12.0, 13.0]).unwrap();
        assert_eq!(s.between(1.0, 2.0).values(), &[11.0, 12.0]);
        assert_eq!(s.between(0.5, 0.7).len(), 0);
        assert_eq!(s.between(3.0, 1.0).len(), 0);
    }

    #[test]
    fn minutes_are_converted_to_hours() {
        let s = TimeSeries::new(vec![0.0, 15.0, 30.0, 60.0], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let h = normalize_time_unit(&s, TimeUnit::Minutes);
        assert_eq!(h.times(), &[0.0, 0.25, 0.5, 1.0]);
        assert_eq!(h.values(), s.values());
    }

    #[test]
    fn unknown_time_unit_is_a_config_error() {
        let err = "fortnights".parse::<TimeUnit>().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!("Minutes".parse::<TimeUnit>().unwrap(), TimeUnit::Minutes);
    }

    #[test]
    fn points_per_hour_uses_median_step() {
        let s = TimeSeries::new(vec![0.0, 0.25, 0.5, 0.75, 5.0], vec![1.0; 5]).unwrap();
        assert_eq!(s.points_per_hour(), Some(4.0));
        assert_eq!(TimeSeries::empty().points_per_hour(), None);
    }

    #[test]
    fn ranking_a_phase_returns_a_new_value() {
        let phase = GrowthPhase {
            start: 1.0,
            end: 4.0,
            slope: 0.5,
            intercept: 0.0,
            n0: 0.0,
            snr: 10.0,
            rank: None,
        };
        let ranked = phase.with_rank(42.0);
        assert_eq!(phase.rank, None);
        assert_eq!(ranked.rank, Some(42.0));
        assert_eq!(ranked.duration(), 3.0);
        assert!((ranked.predict(2.0) - 1.0f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn default_config_is_valid_and_zero_weights_are_not() {
        let config = EstimatorConfig::default();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.phase_rank_weights.values_mut().for_each(|w| *w = 0.0);
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.phase_rank_weights.insert(PhaseMetric::Slope, -1.0);
        assert!(bad.validate().is_err());
    }
}
