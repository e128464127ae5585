//! Candidate growth phase detection.
//!
//! A sample is "growing" when both the first and the second derivative of the
//! smoothed curve are strictly positive there: the curve rises and accelerates.
//! This separates the onset of exponential growth from linear increase and from
//! the decelerating approach to stationary phase.

use crate::domain::{RawGrowthPhase, TimeSeries};
use crate::math::savgol_derivative;

/// Polynomial degree of the derivative filter.
const POLYORDER: usize = 3;

/// Derivatives within this many ulps of the local curve magnitude count as zero,
/// so filter round-off on a flat plateau is not mistaken for growth.
const ROUNDOFF_ULPS: f64 = 1e3;

/// Contiguous runs of growing samples in `curve`, time-ascending.
///
/// `window` is the odd filter width in samples. A window that does not fit the
/// curve yields no phases.
pub fn find_growth_phases(curve: &TimeSeries, window: usize) -> Vec<RawGrowthPhase> {
    let values = curve.values();
    let (Some(first), Some(second)) = (
        savgol_derivative(values, window, POLYORDER, 1),
        savgol_derivative(values, window, POLYORDER, 2),
    ) else {
        return Vec::new();
    };

    let floors = roundoff_floors(values, window);

    let mut phases = Vec::new();
    let mut run_start: Option<f64> = None;
    let mut previous = f64::NAN;

    for (((&time, &d1), &d2), &floor) in curve.times().iter().zip(&first).zip(&second).zip(&floors) {
        if d1 > floor && d2 > floor {
            run_start.get_or_insert(time);
        } else if let Some(start) = run_start.take() {
            phases.push(RawGrowthPhase { start, end: previous });
        }
        previous = time;
    }
    if let Some(start) = run_start {
        phases.push(RawGrowthPhase { start, end: previous });
    }

    phases
}

/// Round-off level of each sample's derivatives, scaled by the largest
/// magnitude in the window the filter fitted for it.
fn roundoff_floors(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let center = i.clamp(half, n - 1 - half);
            let scale = values[center - half..=center + half]
                .iter()
                .fold(0.0f64, |acc, v| acc.max(v.abs()));
            f64::EPSILON * ROUNDOFF_ULPS * scale
        })
        .collect()
}
