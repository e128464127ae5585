//! Segment-based spline smoothing.
//!
//! The smoother builds a shape-preserving proxy of a growth curve in three steps:
//!
//! 1. **Segmentation** (`segment_by_std_dev`): at every `increment` hours, try
//!    windows of `1..=maximum` increments. Each window is detrended and scored by
//!    `std / length`. Windows are then accepted greedily, lowest score first,
//!    skipping any that overlap an already accepted one. Volatile stretches end up
//!    cut into short segments, flat stretches into long ones.
//! 2. **Knot selection** (`segment_points`): one to three knots per segment
//!    depending on its length, each valued by a detrended local median.
//! 3. **Interpolation**: a cubic spline through the knots, evaluated at every
//!    original timestamp.

use crate::domain::TimeSeries;
use crate::math::{detrend, fit_line, linspace, max, median, CubicSpline, CUBIC_MIN_KNOTS};

/// Segmentation step, in hours.
pub const SEGMENT_INCREMENT: i64 = 2;
/// Largest segment, in increments.
pub const SEGMENT_MAXIMUM: i64 = 20;

/// Segments longer than this (hours) get a knot near each end.
const TWO_KNOT_LENGTH: i64 = 5;
/// Segments longer than this (hours) also get a center knot.
const THREE_KNOT_LENGTH: i64 = 11;
/// Width (hours) of the sub-windows used for the knots near segment ends.
const EDGE_WINDOW: i64 = 2;
/// Width (hours) of the windows anchoring the first and last knots.
const BOUNDARY_WINDOW: f64 = 1.0;

/// A half-open stretch `[start, end)` of whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Segment {
    pub start: i64,
    pub end: i64,
}

impl Segment {
    pub fn len(&self) -> i64 {
        self.end - self.start
    }
}

/// A spline control point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knot {
    pub time: f64,
    pub value: f64,
}

/// Smooth `series`, choosing segments on `variance_reference`.
///
/// `variance_reference` is normally `series` itself; callers may pass a
/// transformed copy (e.g. `ln(N - n0)`) to make segmentation more sensitive to
/// changes in growth rate. Returns an empty series when fewer than four knots
/// can be placed.
pub fn segment_spline_smoothing(series: &TimeSeries, variance_reference: &TimeSeries) -> TimeSeries {
    let segments = segment_by_std_dev(variance_reference, SEGMENT_INCREMENT, SEGMENT_MAXIMUM);
    let knots = segment_points(series, &segments);
    if knots.len() < CUBIC_MIN_KNOTS {
        return TimeSeries::empty();
    }

    let xs: Vec<f64> = knots.iter().map(|k| k.time).collect();
    let ys: Vec<f64> = knots.iter().map(|k| k.value).collect();
    match CubicSpline::interpolate(&xs, &ys) {
        Some(spline) => TimeSeries::from_sorted(series.times().to_vec(), spline.evaluate_all(series.times())),
        None => TimeSeries::empty(),
    }
}

/// Partition the time axis into non-overlapping, internally homogeneous segments.
///
/// Segments are returned sorted by start.
pub fn segment_by_std_dev(series: &TimeSeries, increment: i64, maximum: i64) -> Vec<Segment> {
    let (Some(first), Some(last)) = (series.first_time(), series.last_time()) else {
        return Vec::new();
    };
    let increment = increment.max(1);
    let origin = first.floor() as i64;
    let duration = last.floor() as i64;

    let mut windows: Vec<(f64, Segment)> = Vec::new();
    let mut start = origin;
    while start < duration {
        for size in 1..=maximum.max(1) {
            let end = start + size * increment;
            let window = series.between(start as f64, end as f64);
            windows.push((window_score(window.values(), (size * increment) as f64), Segment { start, end }));
        }
        start += increment;
    }

    windows.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let span = windows.iter().map(|(_, s)| s.end).max().unwrap_or(origin) - origin;
    let mut claimed = vec![false; span.max(0) as usize];
    let mut segments = Vec::new();

    for (_, window) in windows {
        let spots = (window.start - origin) as usize..(window.end - origin) as usize;
        if claimed[spots.clone()].iter().any(|&c| c) {
            continue;
        }
        claimed[spots].iter_mut().for_each(|c| *c = true);
        segments.push(Segment {
            start: window.start,
            end: window.end.min(duration),
        });
    }

    segments.sort();
    segments
}

/// Stability score of a window: detrended standard deviation per hour.
fn window_score(values: &[f64], length: f64) -> f64 {
    if values.is_empty() {
        return f64::INFINITY;
    }
    let residuals = detrend(values);
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let std = (residuals.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n).sqrt();
    std / length
}

/// Place spline knots along `segments`.
///
/// The first knot is the median of the first hour and the last knot the maximum
/// of the last hour, so the spline neither starts on an outlier nor undershoots
/// a rising tail.
pub fn segment_points(series: &TimeSeries, segments: &[Segment]) -> Vec<Knot> {
    let (Some(first), Some(last)) = (series.first_time(), series.last_time()) else {
        return Vec::new();
    };

    let mut knots = Vec::with_capacity(segments.len() * 3 + 2);
    if let Some(value) = median(series.between(f64::NEG_INFINITY, first + BOUNDARY_WINDOW).values()) {
        knots.push(Knot { time: first, value });
    }

    for segment in segments {
        let (start, end) = (segment.start, segment.end);
        if segment.len() > TWO_KNOT_LENGTH {
            knots.extend(window_median(series, start, start + EDGE_WINDOW));
            if segment.len() > THREE_KNOT_LENGTH {
                knots.extend(window_median(series, start + EDGE_WINDOW, end - EDGE_WINDOW));
            }
            knots.extend(window_median(series, end - EDGE_WINDOW, end));
        } else {
            knots.extend(window_median(series, start, end));
        }
    }

    if let Some(value) = max(series.between(last - BOUNDARY_WINDOW, f64::INFINITY).values()) {
        knots.push(Knot { time: last, value });
    }

    knots.sort_by(|a, b| a.time.total_cmp(&b.time));
    knots.dedup_by(|later, earlier| later.time == earlier.time);
    knots
}

/// Knot at the center of `[start, end]`, valued by the detrended median of the
/// window plus half its local slope.
fn window_median(series: &TimeSeries, start: i64, end: i64) -> Option<Knot> {
    let window = series.between(start as f64, end as f64);
    let values = window.values();
    if values.is_empty() {
        return None;
    }

    let x = linspace(0.0, 1.0, values.len());
    let slope = fit_line(&x, values).map(|line| line.slope).unwrap_or(0.0);
    let residuals: Vec<f64> = values.iter().zip(&x).map(|(v, xi)| v - slope * xi).collect();

    Some(Knot {
        time: (start + end) as f64 / 2.0,
        value: median(&residuals)? + 0.5 * slope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(values: &[f64], per_hour: usize) -> TimeSeries {
        let times = (0..values.len()).map(|i| i as f64 / per_hour as f64).collect();
        TimeSeries::new(times, values.to_vec()).unwrap()
    }

    #[test]
    fn segments_cover_the_axis_without_overlap() {
        let values: Vec<f64> = (0..200).map(|i| (0.3 * i as f64 / 4.0).exp()).collect();
        let series = hourly(&values, 4);
        let segments = segment_by_std_dev(&series, 2, 20);

        assert!(!segments.is_empty());
        assert_eq!(segments[0].start, 0);
        for pair in segments.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
        assert!(segments.iter().all(|s| s.end <= 49 && s.len() > 0));
    }

    #[test]
    fn flat_curves_get_long_segments() {
        let series = hourly(&vec![1.0; 4 * 60], 4);
        let segments = segment_by_std_dev(&series, 2, 20);
        // Every window scores zero; ties resolve to the earliest, shortest window.
        assert_eq!(segments.first(), Some(&Segment { start: 0, end: 2 }));
        assert!(segments.iter().all(|s| s.len() == 2 || s.end == 59));
    }

    #[test]
    fn knot_values_follow_a_line_exactly() {
        let values: Vec<f64> = (0..41).map(|i| 2.0 + 0.5 * i as f64 / 4.0).collect();
        let series = hourly(&values, 4);
        let knot = window_median(&series, 2, 6).unwrap();
        assert_eq!(knot.time, 4.0);
        assert!((knot.value - 4.0).abs() < 1e-12);
    }

    #[test]
    fn boundary_knots_use_median_and_max() {
        let values: Vec<f64> = vec![5.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 9.0, 3.0];
        let series = hourly(&values, 2);
        let knots = segment_points(&series, &[]);
        assert_eq!(knots.len(), 2);
        assert_eq!(knots[0], Knot { time: 0.0, value: 1.0 });
        assert_eq!(knots[1], Knot { time: 4.5, value: 9.0 });
    }

    #[test]
    fn smoothing_tracks_an_exponential() {
        let values: Vec<f64> = (0..100).map(|i| (0.5 * i as f64 / 4.0).exp()).collect();
        let series = hourly(&values, 4);
        let smooth = segment_spline_smoothing(&series, &series);

        assert_eq!(smooth.times(), series.times());
        // First knot: median of the first hour (t = 0..=1), placed at t = 0.
        assert!((smooth.values()[0] - 0.25f64.exp()).abs() < 1e-9);
        for ((t, s), v) in series.times().iter().zip(smooth.values()).zip(series.values()) {
            if *t >= 1.0 {
                assert!((s - v).abs() / v < 0.1, "smoothed {s} vs {v} at t={t}");
            }
        }
    }

    #[test]
    fn too_short_series_cannot_be_smoothed() {
        let series = hourly(&[1.0, 2.0, 3.0], 4);
        assert!(segment_spline_smoothing(&series, &series).is_empty());
    }
}
