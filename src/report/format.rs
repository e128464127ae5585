//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the estimation code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::FileOutput;
use crate::domain::{AnnotatedCurve, GrowthPhase};

/// Summary of one input file: curve table plus skipped/failed curves.
pub fn format_file_summary(output: &FileOutput) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} ===\n", output.input.display()));
    out.push_str(&format!("Curves: {} estimated", output.outcomes.len()));
    if !output.skipped.is_empty() {
        out.push_str(&format!(" | {} skipped (no values)", output.skipped.len()));
    }
    if !output.row_errors.is_empty() {
        out.push_str(&format!(" | {} row issues", output.row_errors.len()));
    }
    out.push('\n');

    out.push_str(&format_phase_table(&output.succeeded()));

    for outcome in &output.outcomes {
        if let Err(err) = &outcome.result {
            out.push_str(&format!("  (failed) {err}\n"));
        }
    }
    for name in &output.skipped {
        out.push_str(&format!("  (skipped) {name}\n"));
    }
    for row in output.row_errors.iter().take(5) {
        out.push_str(&format!("  (line {}) {}\n", row.line, row.message));
    }
    if output.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more row issues\n", output.row_errors.len() - 5));
    }

    out.push_str(&format!("Phases: {}\n", output.tsv_path.display()));
    if let Some(path) = &output.json_path {
        out.push_str(&format!("Curves: {}\n", path.display()));
    }

    out
}

/// One row per curve with its best phase.
pub fn format_phase_table(curves: &[(&str, &AnnotatedCurve)]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>7} {:>8} {:>8} {:>8} {:>10} {:>6} {:>6}\n",
            "curve", "phases", "start", "end", "slope", "SNR", "rank", "outl."
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<7} {:-<8} {:-<8} {:-<8} {:-<10} {:-<6} {:-<6}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for &(name, curve) in curves {
        let best = curve.best_phase();
        out.push_str(
            format!(
                "{:<20} {:>7} {} {:>6}\n",
                truncate(name, 20),
                curve.growth_phases.len(),
                fmt_phase(best),
                curve.outliers.len(),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_phase(phase: Option<&GrowthPhase>) -> String {
    match phase {
        Some(p) => format!(
            "{:>8.2} {:>8.2} {:>8.4} {:>10.1} {:>6.1}",
            p.start,
            p.end,
            p.slope,
            p.snr,
            p.rank.unwrap_or(f64::NAN)
        ),
        None => format!("{:>8} {:>8} {:>8} {:>10} {:>6}", "-", "-", "-", "-", "-"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
