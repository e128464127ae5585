//! Multi-criterion phase ranking.
//!
//! Each weighted metric is min-max scaled to `[0, 100]` across the candidate
//! phases. The metric's threshold joins the scale as an extra value, so a phase
//! that barely clears a threshold scores near zero on it even when it is the only
//! candidate. The rank is the weighted mean of the scaled scores.

use crate::domain::{GrowthPhase, MetricMap};

/// Score phases on `weights` and return them best first.
///
/// Equal ranks keep their input order.
pub fn rank_phases(phases: &[GrowthPhase], weights: &MetricMap, thresholds: &MetricMap) -> Vec<GrowthPhase> {
    if phases.is_empty() {
        return Vec::new();
    }

    let total_weight: f64 = weights.values().sum();
    let mut weighted = vec![0.0; phases.len()];

    for (&metric, &weight) in weights {
        let values: Vec<f64> = phases.iter().map(|p| p.metric(metric)).collect();
        let (lo, hi) = values
            .iter()
            .chain(thresholds.get(&metric))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        for (acc, &v) in weighted.iter_mut().zip(&values) {
            *acc += weight * scaled_score(v, lo, hi);
        }
    }

    let mut ranked: Vec<GrowthPhase> = phases
        .iter()
        .zip(&weighted)
        .map(|(phase, &w)| phase.with_rank(w / total_weight))
        .collect();
    // `sort_by` is stable.
    ranked.sort_by(|a, b| rank_of(b).total_cmp(&rank_of(a)));
    ranked
}

/// The top of the scale (including a degenerate or unbounded one) scores 100.
fn scaled_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value >= hi {
        100.0
    } else {
        (value - lo) / (hi - lo) * 100.0
    }
}

fn rank_of(phase: &GrowthPhase) -> f64 {
    phase.rank.unwrap_or(f64::NEG_INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PhaseMetric;
    use approx::assert_abs_diff_eq;

    fn phase(start: f64, end: f64, slope: f64, snr: f64) -> GrowthPhase {
        GrowthPhase {
            start,
            end,
            slope,
            intercept: 0.0,
            n0: 0.0,
            snr,
            rank: None,
        }
    }

    fn thresholds() -> MetricMap {
        MetricMap::from([
            (PhaseMetric::Duration, 1.5),
            (PhaseMetric::Slope, 0.005),
            (PhaseMetric::Snr, 1.0),
        ])
    }

    #[test]
    fn best_phase_comes_first_and_scores_stay_in_range() {
        let weights = MetricMap::from([
            (PhaseMetric::Snr, 50.0),
            (PhaseMetric::Duration, 30.0),
            (PhaseMetric::Slope, 10.0),
        ]);
        let phases = [
            phase(0.0, 2.0, 0.1, 5.0),
            phase(3.0, 12.0, 0.4, 900.0),
            phase(13.0, 16.0, 0.2, 40.0),
        ];

        let ranked = rank_phases(&phases, &weights, &thresholds());
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].start, 3.0);
        // Largest value on every metric.
        assert_abs_diff_eq!(ranked[0].rank.unwrap(), 100.0, epsilon = 1e-9);
        for pair in ranked.windows(2) {
            assert!(pair[0].rank >= pair[1].rank);
        }
        assert!(ranked.iter().all(|p| (0.0..=100.0).contains(&p.rank.unwrap())));
    }

    #[test]
    fn threshold_anchors_a_single_candidate() {
        let weights = MetricMap::from([(PhaseMetric::Duration, 1.0)]);
        let ranked = rank_phases(&[phase(0.0, 3.5, 0.3, 10.0)], &weights, &thresholds());
        // Scale [1.5, 3.5]: the lone phase sits at its top.
        assert_eq!(ranked[0].rank, Some(100.0));

        let ranked = rank_phases(&[phase(0.0, 1.5, 0.3, 10.0)], &weights, &thresholds());
        // Phase equals the threshold: degenerate scale scores full marks.
        assert_eq!(ranked[0].rank, Some(100.0));
    }

    #[test]
    fn weights_blend_metric_scores() {
        let weights = MetricMap::from([(PhaseMetric::Duration, 3.0), (PhaseMetric::Slope, 1.0)]);
        let no_thresholds = MetricMap::new();
        let phases = [phase(0.0, 4.0, 0.1, 2.0), phase(5.0, 7.0, 0.3, 2.0)];

        let ranked = rank_phases(&phases, &weights, &no_thresholds);
        // Long slow phase: duration 100, slope 0 -> 75. Short fast phase: 0 and 100 -> 25.
        assert_eq!(ranked[0].start, 0.0);
        assert_abs_diff_eq!(ranked[0].rank.unwrap(), 75.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ranked[1].rank.unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn unbounded_snr_does_not_poison_the_rank() {
        let weights = MetricMap::from([(PhaseMetric::Snr, 1.0), (PhaseMetric::Duration, 1.0)]);
        let phases = [phase(0.0, 4.0, 0.5, f64::INFINITY), phase(5.0, 7.0, 0.5, 300.0)];
        let ranked = rank_phases(&phases, &weights, &thresholds());
        assert_eq!(ranked[0].rank, Some(100.0));
        // SNR 300 on an unbounded scale scores 0; duration 2 on [1.5, 4] scores 20.
        assert_abs_diff_eq!(ranked[1].rank.unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn ties_keep_input_order() {
        let weights = MetricMap::from([(PhaseMetric::Slope, 1.0)]);
        let phases = [phase(0.0, 2.0, 0.2, 5.0), phase(4.0, 9.0, 0.2, 50.0)];
        let ranked = rank_phases(&phases, &weights, &MetricMap::new());
        assert_eq!(ranked[0].start, 0.0);
        assert_eq!(ranked[1].start, 4.0);
    }
}
