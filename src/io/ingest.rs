//! TSV ingest.
//!
//! Input files are tab-separated tables with one row per time point:
//!
//! ```text
//! time    curve_a   curve_b
//! 0.0     0.011     0.009
//! 0.25    0.012
//! ```
//!
//! The first column holds times, every further column one curve named by its
//! header. Empty cells are missing values (`NaN`) and are dropped later by the
//! estimator.
//!
//! Design goals:
//! - **Strict schema** for the header (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no estimation logic here

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::TimeSeries;
use crate::error::AppError;

/// One named curve from an input table.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedCurve {
    pub name: String,
    pub series: TimeSeries,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: curves in column order plus row errors.
#[derive(Debug, Clone)]
pub struct CurveTable {
    pub curves: Vec<NamedCurve>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Read every curve of a TSV file.
pub fn read_curves_tsv(path: &Path) -> Result<CurveTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open TSV '{}': {e}", path.display())))?;
    parse_curves_tsv(file, &path.display().to_string())
}

/// Parse curves from TSV text; `source` names the input in error messages.
pub fn parse_curves_tsv<R: Read>(input: R, source: &str) -> Result<CurveTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read TSV header of '{source}': {e}")))?
        .clone();
    let names = curve_names(&headers, source)?;

    let mut times = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header, lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("TSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, names.len()) {
            Ok((time, values, bad_cells)) => {
                times.push(time);
                for (column, value) in columns.iter_mut().zip(values) {
                    column.push(value);
                }
                for cell in bad_cells {
                    row_errors.push(RowError {
                        line,
                        message: format!("Invalid value '{}' for '{}'; treated as missing.", cell.1, names[cell.0]),
                    });
                }
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let rows_used = times.len();
    let curves = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| {
            let series = TimeSeries::new(times.clone(), values)
                .map_err(|e| AppError::new(2, format!("Curve '{name}' in '{source}': {}", e.message())))?;
            Ok(NamedCurve { name, series })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(CurveTable {
        curves,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn curve_names(headers: &StringRecord, source: &str) -> Result<Vec<String>, AppError> {
    if headers.len() < 2 {
        return Err(AppError::new(
            2,
            format!("'{source}' needs a time column and at least one curve column."),
        ));
    }
    Ok(headers
        .iter()
        .enumerate()
        .skip(1)
        .map(|(idx, name)| {
            let name = normalize_header_name(name);
            if name.is_empty() { format!("column_{idx}") } else { name }
        })
        .collect())
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Time, one value per curve, and the `(column, text)` of unparsable cells.
type ParsedRow = (f64, Vec<f64>, Vec<(usize, String)>);

fn parse_row(record: &StringRecord, n_curves: usize) -> Result<ParsedRow, String> {
    let raw_time = record.get(0).unwrap_or("");
    if raw_time.is_empty() {
        return Err("Missing time value.".to_string());
    }
    let time = raw_time
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| format!("Invalid time '{raw_time}'."))?;

    let mut values = Vec::with_capacity(n_curves);
    let mut bad_cells = Vec::new();
    for column in 0..n_curves {
        let cell = record.get(column + 1).unwrap_or("");
        let value = match parse_cell(cell) {
            Some(v) => v,
            None => {
                bad_cells.push((column, cell.to_string()));
                f64::NAN
            }
        };
        values.push(value);
    }
    Ok((time, values, bad_cells))
}

/// Empty cells are missing values; anything else must be a number.
fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na") {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_curves_with_missing_cells() {
        let text = "time\tA\tB\n0\t1.0\t2.0\n0.5\t\t2.5\n1.0\t1.5\t3.0\n";
        let table = parse_curves_tsv(text.as_bytes(), "inline").unwrap();

        assert_eq!(table.rows_read, 3);
        assert_eq!(table.curves.len(), 2);
        assert_eq!(table.curves[0].name, "A");
        assert_eq!(table.curves[1].series.values(), &[2.0, 2.5, 3.0]);
        assert!(table.curves[0].series.values()[1].is_nan());
        assert_eq!(table.curves[0].series.drop_missing().len(), 2);
        assert!(table.row_errors.is_empty());
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let text = "\u{feff}time\tA\n0\t1\nabc\t2\n1\tx\n";
        let table = parse_curves_tsv(text.as_bytes(), "inline").unwrap();

        assert_eq!(table.rows_used, 2);
        assert_eq!(table.row_errors.len(), 2);
        assert_eq!(table.row_errors[0].line, 3);
        assert!(table.curves[0].series.values()[1].is_nan());
    }

    #[test]
    fn unordered_times_are_an_input_error() {
        let text = "time\tA\n1\t1\n0\t2\n";
        let err = parse_curves_tsv(text.as_bytes(), "inline").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("'A'"));
    }

    #[test]
    fn header_without_curves_is_rejected() {
        assert!(parse_curves_tsv("time\n0\n".as_bytes(), "inline").is_err());
    }
}
