use proptest::prelude::*;

use growth_curves::domain::TimeSeries;
use growth_curves::estimation::remove_outliers;

fn series(values: Vec<f64>) -> TimeSeries {
    let times = (0..values.len()).map(|i| i as f64 * 0.25).collect();
    TimeSeries::new(times, values).unwrap()
}

proptest! {
    #[test]
    fn clean_and_outliers_partition_the_input(
        values in prop::collection::vec(-100.0f64..100.0, 0..80),
        half in 0usize..12,
    ) {
        let input = series(values);
        let (clean, outliers) = remove_outliers(&input, 2 * half + 1, 3.0);

        prop_assert_eq!(clean.len() + outliers.len(), input.len());

        // Merging both halves by time gives the input back.
        let mut merged: Vec<(f64, f64)> = clean.iter().chain(outliers.iter()).map(|s| (s.time, s.value)).collect();
        merged.sort_by(|a, b| a.0.total_cmp(&b.0));
        let original: Vec<(f64, f64)> = input.iter().map(|s| (s.time, s.value)).collect();
        prop_assert_eq!(merged, original);
    }

    #[test]
    fn short_series_are_never_filtered(values in prop::collection::vec(-1e6f64..1e6, 0..10)) {
        let input = series(values);
        let (clean, outliers) = remove_outliers(&input, 5, 3.0);
        prop_assert_eq!(clean, input);
        prop_assert!(outliers.is_empty());
    }
}
