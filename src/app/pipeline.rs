//! Shared batch estimation logic.
//!
//! Keeping this in one place separates the workflow from presentation:
//! TSV ingest -> unit normalization -> parallel estimation -> per-file exports
//!
//! Curves are independent, so each one runs as its own rayon task. A panic while
//! estimating one curve is caught and reported; the rest of the batch continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::domain::{normalize_time_unit, AnnotatedCurve, EstimatorConfig, TimeUnit};
use crate::error::AppError;
use crate::estimation::Estimator;
use crate::io::ingest::{read_curves_tsv, NamedCurve, RowError};

/// Everything a batch run needs besides the input files.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub time_unit: TimeUnit,
    pub estimator: EstimatorConfig,
    pub output_suffix: String,
    pub exclude_default_phase: bool,
    pub json: bool,
}

/// Result of estimating one curve.
#[derive(Debug, Clone)]
pub struct CurveOutcome {
    pub name: String,
    pub result: Result<AnnotatedCurve, AppError>,
}

/// All outputs computed for one input file.
#[derive(Debug, Clone)]
pub struct FileOutput {
    pub input: PathBuf,
    pub tsv_path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub outcomes: Vec<CurveOutcome>,
    /// Curves with no usable values, not estimated.
    pub skipped: Vec<String>,
    pub row_errors: Vec<RowError>,
}

impl FileOutput {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// `(name, curve)` pairs for the curves that were estimated.
    pub fn succeeded(&self) -> Vec<(&str, &AnnotatedCurve)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|c| (o.name.as_str(), c)))
            .collect()
    }
}

/// Estimate every curve of every input and write the exports next to each input.
pub fn run_batch(inputs: &[PathBuf], options: &BatchOptions) -> Result<Vec<FileOutput>, AppError> {
    options.estimator.validate()?;
    let estimator = Estimator::new(options.estimator.clone());

    inputs
        .iter()
        .map(|input| {
            let output = estimate_file(input, &estimator, options)?;
            write_outputs(&output, options)?;
            Ok(output)
        })
        .collect()
}

/// Read and estimate one TSV file without writing anything.
pub fn estimate_file(input: &Path, estimator: &Estimator, options: &BatchOptions) -> Result<FileOutput, AppError> {
    let table = read_curves_tsv(input)?;
    if !table.row_errors.is_empty() {
        warn!(file = %input.display(), count = table.row_errors.len(), "skipped or patched malformed rows");
    }

    let (curves, empty): (Vec<NamedCurve>, Vec<NamedCurve>) = table
        .curves
        .into_iter()
        .partition(|c| !c.series.drop_missing().is_empty());
    let skipped: Vec<String> = empty.into_iter().map(|c| c.name).collect();
    for name in &skipped {
        warn!(file = %input.display(), curve = %name, "curve has no values; skipping");
    }

    info!(file = %input.display(), curves = curves.len(), "estimating growth phases");
    let outcomes = estimate_curves(estimator, curves, options.time_unit);

    let json_path = options.json.then(|| output_path(input, &options.output_suffix, "json"));
    Ok(FileOutput {
        input: input.to_path_buf(),
        tsv_path: output_path(input, &options.output_suffix, "tsv"),
        json_path,
        outcomes,
        skipped,
        row_errors: table.row_errors,
    })
}

/// Estimate curves in parallel, keeping input order.
pub fn estimate_curves(estimator: &Estimator, curves: Vec<NamedCurve>, unit: TimeUnit) -> Vec<CurveOutcome> {
    curves
        .into_par_iter()
        .map(|curve| {
            let series = normalize_time_unit(&curve.series, unit);
            let result = catch_unwind(AssertUnwindSafe(|| estimator.growth(&series, &curve.name)))
                .map_err(|panic| {
                    let reason = panic_message(panic.as_ref());
                    error!(curve = %curve.name, %reason, "growth estimation failed");
                    AppError::new(4, format!("Curve '{}': estimation failed: {reason}", curve.name))
                });
            CurveOutcome {
                name: curve.name,
                result,
            }
        })
        .collect()
}

fn write_outputs(output: &FileOutput, options: &BatchOptions) -> Result<(), AppError> {
    let curves = output.succeeded();
    crate::io::export::write_phases_tsv(&output.tsv_path, &curves, options.exclude_default_phase)?;
    if let Some(path) = &output.json_path {
        crate::io::curve::write_annotated_json(path, &curves)?;
    }
    Ok(())
}

/// `dir/curves.tsv` -> `dir/curves<suffix>.<extension>`.
pub fn output_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "curves".to_string());
    input.with_file_name(format!("{stem}{suffix}.{extension}"))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
