//! Write annotated curves as JSON.
//!
//! The file is an array with one object per curve:
//!
//! ```text
//! [{"name": ..., "series": {"times": [...], "values": [...]},
//!   "outliers": {...}, "growth_phases": [{"start": ..., "SNR": ..., ...}]}]
//! ```
//!
//! Non-finite numbers are written as `null`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::AnnotatedCurve;
use crate::error::AppError;

#[derive(Serialize)]
struct CurveRecord<'a> {
    name: &'a str,
    #[serde(flatten)]
    curve: &'a AnnotatedCurve,
}

/// Write annotated curves to a JSON file.
pub fn write_annotated_json(path: &Path, curves: &[(&str, &AnnotatedCurve)]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    write_annotated(file, curves)
}

pub fn write_annotated<W: Write>(writer: W, curves: &[(&str, &AnnotatedCurve)]) -> Result<(), AppError> {
    let records: Vec<CurveRecord<'_>> = curves
        .iter()
        .map(|&(name, curve)| CurveRecord { name, curve })
        .collect();

    serde_json::to_writer_pretty(writer, &records)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GrowthPhase, TimeSeries};

    #[test]
    fn json_carries_names_and_phase_fields() {
        let curve = AnnotatedCurve {
            series: TimeSeries::new(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap(),
            outliers: TimeSeries::empty(),
            growth_phases: vec![GrowthPhase {
                start: 0.0,
                end: 1.0,
                slope: 0.7,
                intercept: f64::NAN,
                n0: 0.0,
                snr: 50.0,
                rank: Some(100.0),
            }],
        };

        let mut buf = Vec::new();
        write_annotated(&mut buf, &[("well_a1", &curve)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value[0]["name"], "well_a1");
        assert_eq!(value[0]["series"]["values"][1], 2.0);
        assert_eq!(value[0]["growth_phases"][0]["SNR"], 50.0);
        assert!(value[0]["growth_phases"][0]["intercept"].is_null());
    }
}
