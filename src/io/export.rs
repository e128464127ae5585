//! Export estimation results to TSV.
//!
//! One row per growth phase, numbered from 1 in rank order. Unless excluded, each
//! curve also gets a phase `0` row repeating its best phase (or empty cells when
//! none survived), so downstream scripts can read one row per curve.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data::SampleData;
use crate::domain::{AnnotatedCurve, GrowthPhase};
use crate::error::AppError;

const PHASE_COLUMNS: [&str; 9] = ["name", "phase", "start", "end", "slope", "intercept", "n0", "SNR", "rank"];

/// Write growth phases of `curves` to a TSV file.
pub fn write_phases_tsv(
    path: &Path,
    curves: &[(&str, &AnnotatedCurve)],
    exclude_default_phase: bool,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export TSV '{}': {e}", path.display())))?;
    write_phases(file, curves, exclude_default_phase)
}

/// Same as [`write_phases_tsv`], into any writer.
pub fn write_phases<W: Write>(
    writer: W,
    curves: &[(&str, &AnnotatedCurve)],
    exclude_default_phase: bool,
) -> Result<(), AppError> {
    let mut out = tsv_writer(writer);
    out.write_record(PHASE_COLUMNS).map_err(write_error)?;

    for &(name, curve) in curves {
        if !exclude_default_phase {
            out.write_record(phase_record(name, 0, curve.best_phase())).map_err(write_error)?;
        }
        for (i, phase) in curve.growth_phases.iter().enumerate() {
            out.write_record(phase_record(name, i + 1, Some(phase))).map_err(write_error)?;
        }
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export TSV: {e}")))
}

/// Write a simulated sample as an input-compatible TSV table.
pub fn write_sample_tsv<W: Write>(writer: W, sample: &SampleData) -> Result<(), AppError> {
    let mut out = tsv_writer(writer);

    let header = std::iter::once("time".to_string()).chain(sample.curves.iter().map(|c| c.name.clone()));
    out.write_record(header).map_err(write_error)?;

    for (i, t) in sample.times.iter().enumerate() {
        let row = std::iter::once(format!("{t}")).chain(sample.curves.iter().map(|c| format!("{:.6}", c.values[i])));
        out.write_record(row).map_err(write_error)?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush sample TSV: {e}")))
}

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer)
}

fn phase_record(name: &str, index: usize, phase: Option<&GrowthPhase>) -> Vec<String> {
    let mut record = vec![name.to_string(), index.to_string()];
    match phase {
        Some(p) => record.extend(
            [p.start, p.end, p.slope, p.intercept, p.n0, p.snr, p.rank.unwrap_or(f64::NAN)]
                .iter()
                .map(|v| fmt_number(*v)),
        ),
        None => record.extend(std::iter::repeat_n(String::new(), 7)),
    }
    record
}

/// Missing values become empty cells; infinities are written as `inf`.
fn fmt_number(v: f64) -> String {
    if v.is_nan() { String::new() } else { format!("{v:.6}") }
}

fn write_error(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write TSV row: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeSeries;

    fn phase(start: f64, rank: f64) -> GrowthPhase {
        GrowthPhase {
            start,
            end: start + 2.0,
            slope: 0.5,
            intercept: 1.0,
            n0: 0.0,
            snr: 120.0,
            rank: Some(rank),
        }
    }

    fn render(curves: &[(&str, &AnnotatedCurve)], exclude_default_phase: bool) -> String {
        let mut buf = Vec::new();
        write_phases(&mut buf, curves, exclude_default_phase).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn default_phase_repeats_the_best_phase() {
        let curve = AnnotatedCurve {
            series: TimeSeries::empty(),
            outliers: TimeSeries::empty(),
            growth_phases: vec![phase(3.0, 90.0), phase(10.0, 40.0)],
        };
        let text = render(&[("A", &curve)], false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "name\tphase\tstart\tend\tslope\tintercept\tn0\tSNR\trank");
        assert_eq!(lines[1], "A\t0\t3.000000\t5.000000\t0.500000\t1.000000\t0.000000\t120.000000\t90.000000");
        assert!(lines[2].starts_with("A\t1\t3.000000"));
        assert!(lines[3].starts_with("A\t2\t10.000000"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn exact_fits_keep_an_infinite_snr() {
        let mut exact = phase(0.0, 100.0);
        exact.snr = f64::INFINITY;
        exact.intercept = f64::NAN;
        let curve = AnnotatedCurve {
            series: TimeSeries::empty(),
            outliers: TimeSeries::empty(),
            growth_phases: vec![exact],
        };
        let text = render(&[("C", &curve)], true);
        assert_eq!(
            text.lines().nth(1),
            Some("C\t1\t0.000000\t2.000000\t0.500000\t\t0.000000\tinf\t100.000000")
        );
    }

    #[test]
    fn curves_without_phases_get_an_empty_default_row() {
        let curve = AnnotatedCurve::empty();
        assert_eq!(render(&[("B", &curve)], false).lines().nth(1), Some("B\t0\t\t\t\t\t\t\t"));
        assert_eq!(render(&[("B", &curve)], true).lines().count(), 1);
    }
}
