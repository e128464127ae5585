//! Rolling median / standard deviation outlier rejection.
//!
//! A point is rejected when it lies at least `std_multiplier` rolling standard
//! deviations away from the rolling median of the window centered on it.
//!
//! Both ends of the series are padded ("overhang") with `window` synthetic
//! values before the rolling statistics are computed, so the first and last
//! points get full windows too:
//! - start pad: median of the first `window/2 + 1` values
//! - end pad: maximum of the last `window/2 + 1` values (growth curves end high)

use crate::domain::TimeSeries;
use crate::math::{max, median, sample_std};

/// Series shorter than this are returned unchanged.
const MIN_POINTS: usize = 10;

/// Split `series` into `(clean, outliers)`, both in time order.
///
/// `series` must not contain missing values.
pub fn remove_outliers(series: &TimeSeries, window: usize, std_multiplier: f64) -> (TimeSeries, TimeSeries) {
    if series.len() < MIN_POINTS {
        return (series.clone(), TimeSeries::empty());
    }

    let window = window.max(1);
    let padded = with_overhangs(series.values(), window);
    let offset = window / 2;

    let outlier_mask: Vec<bool> = (0..series.len())
        .map(|i| {
            // Index `i` of the original series sits at `i + window` in `padded`.
            let start = i + window - offset;
            let values = &padded[start..start + window];
            let value = padded[i + window];
            match (median(values), sample_std(values)) {
                (Some(center), Some(std)) if center.is_finite() && std.is_finite() => {
                    (value - center).abs() >= std * std_multiplier
                }
                _ => true,
            }
        })
        .collect();

    let mut flags = outlier_mask.iter();
    let clean = series.filter(|_| flags.next().is_some_and(|&outlier| !outlier));
    let mut flags = outlier_mask.iter();
    let outliers = series.filter(|_| flags.next().is_some_and(|&outlier| outlier));

    (clean, outliers)
}

/// Pad `values` with `size` copies of a start and an end value.
fn with_overhangs(values: &[f64], size: usize) -> Vec<f64> {
    let edge = (size / 2 + 1).min(values.len());
    let start = median(&values[..edge]).unwrap_or(f64::NAN);
    let end = max(&values[values.len() - edge..]).unwrap_or(f64::NAN);

    let mut out = Vec::with_capacity(values.len() + 2 * size);
    out.extend(std::iter::repeat_n(start, size));
    out.extend_from_slice(values);
    out.extend(std::iter::repeat_n(end, size));
    out
}
