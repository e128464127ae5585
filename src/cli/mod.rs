//! Command-line parsing for the growth phase estimator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{PhaseMetric, TimeUnit};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "growth", version, about = "Exponential growth phase estimation for growth curves")]
pub struct Cli {
    /// Log debug details to stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate growth phases for every curve in one or more TSV files.
    Estimate(EstimateArgs),
    /// Write a synthetic noisy growth curve TSV (useful for trying the estimator).
    Simulate(SimulateArgs),
}

/// Options for growth phase estimation.
///
/// Threshold flags left unset fall back to the `--config` file, then to the
/// built-in defaults.
#[derive(Debug, Parser, Clone)]
pub struct EstimateArgs {
    /// Input TSV files: a time column followed by one column per curve.
    #[arg(required = true, value_name = "TSV")]
    pub inputs: Vec<PathBuf>,

    /// Unit of the time column.
    #[arg(long, value_enum, default_value_t = TimeUnit::Hours)]
    pub input_time_unit: TimeUnit,

    /// Baseline subtracted before log-space segmentation and used as fixed N0.
    #[arg(long)]
    pub n0: Option<f64>,

    /// Fix every phase's N0 to `--n0` instead of fitting it.
    #[arg(long)]
    pub constrain_n0: bool,

    /// Segment the curve on ln(N - N0) rather than N.
    #[arg(long)]
    pub segment_log_n0: bool,

    /// Suffix appended to each input's file stem for the output files.
    #[arg(long, default_value = ".output")]
    pub output_suffix: String,

    /// Do not write the phase 0 (best phase) row per curve.
    #[arg(long)]
    pub exclude_default_phase: bool,

    /// Also write annotated curves as JSON.
    #[arg(long)]
    pub json: bool,

    /// Render an ASCII plot of every curve in the terminal.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Minimum curve duration in hours; sets the smoothing window [default: 5].
    #[arg(long)]
    pub curve_minimum_duration: Option<f64>,

    /// Minimum phase duration in hours [default: 1.5].
    #[arg(long)]
    pub phase_minimum_duration: Option<f64>,

    /// Minimum phase growth rate [default: 0.005].
    #[arg(long)]
    pub phase_minimum_slope: Option<f64>,

    /// Minimum phase signal-to-noise ratio [default: 1].
    #[arg(long)]
    pub phase_minimum_snr: Option<f64>,

    /// Drop phases ranked below this score, 0-100 [default: 33].
    #[arg(long)]
    pub phase_rank_exclude_below: Option<f64>,

    /// Ranking weight, e.g. `--rank-weight SNR=50` (repeatable; replaces all defaults).
    #[arg(long = "rank-weight", value_name = "METRIC=WEIGHT", value_parser = parse_rank_weight)]
    pub rank_weights: Vec<(PhaseMetric, f64)>,

    /// JSON file with estimator settings keyed by name (e.g. `phase_minimum_slope`).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,
}

/// Options for synthetic data generation.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Number of curves.
    #[arg(short = 'n', long, default_value_t = 4)]
    pub curves: usize,

    /// Duration in hours.
    #[arg(long, default_value_t = 24.0)]
    pub hours: f64,

    /// Sampling density.
    #[arg(long, default_value_t = 4.0)]
    pub points_per_hour: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Standard deviation of the log-normal measurement noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise_sd: f64,

    /// Probability of a spurious jump per observation.
    #[arg(long, default_value_t = 0.01)]
    pub jump_prob: f64,

    /// Baseline signal.
    #[arg(long, default_value_t = 0.05)]
    pub n0: f64,

    /// Output TSV (stdout when omitted).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_rank_weight(s: &str) -> Result<(PhaseMetric, f64), String> {
    let (metric, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("expected METRIC=WEIGHT, got '{s}'"))?;
    let metric = metric.parse::<PhaseMetric>().map_err(|e| e.to_string())?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{weight}': {e}"))?;
    Ok((metric, weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_estimate_flags() {
        let cli = Cli::parse_from([
            "growth",
            "-v",
            "estimate",
            "a.tsv",
            "b.tsv",
            "--input-time-unit",
            "minutes",
            "--constrain-n0",
            "--n0",
            "0.05",
            "--rank-weight",
            "snr=2",
            "--rank-weight",
            "duration=1",
        ]);
        assert!(cli.verbose);
        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.input_time_unit, TimeUnit::Minutes);
        assert!(args.constrain_n0);
        assert_eq!(args.n0, Some(0.05));
        assert_eq!(args.rank_weights, vec![(PhaseMetric::Snr, 2.0), (PhaseMetric::Duration, 1.0)]);
        assert_eq!(args.output_suffix, ".output");
    }

    #[test]
    fn rank_weight_needs_metric_and_number() {
        assert!(parse_rank_weight("slope=0.5").is_ok());
        assert!(parse_rank_weight("slope").is_err());
        assert!(parse_rank_weight("speed=1").is_err());
        assert!(parse_rank_weight("slope=fast").is_err());
    }
}
