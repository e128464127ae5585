//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - builds the estimator configuration (defaults, `--config` file, flags)
//! - runs batch estimation and prints summaries/plots
//! - generates synthetic samples

use std::fs::File;
use std::io;
use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EstimateArgs, SimulateArgs};
use crate::data::{generate_sample, SimulationConfig};
use crate::domain::{EstimatorConfig, MetricMap};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `growth` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Estimate(args) => handle_estimate(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let base = match &args.config {
        Some(path) => read_config_file(path)?,
        None => EstimatorConfig::default(),
    };
    let options = pipeline::BatchOptions {
        time_unit: args.input_time_unit,
        estimator: estimator_config_from_args(&args, base),
        output_suffix: args.output_suffix.clone(),
        exclude_default_phase: args.exclude_default_phase,
        json: args.json,
    };

    let outputs = pipeline::run_batch(&args.inputs, &options)?;

    let mut failed = 0usize;
    for output in &outputs {
        println!("{}", crate::report::format_file_summary(output));
        if args.plot {
            for (name, curve) in output.succeeded() {
                println!("{name}");
                println!("{}", crate::plot::render_ascii_plot(curve, args.width, args.height));
            }
        }
        failed += output.failed();
    }

    if failed > 0 {
        return Err(AppError::new(4, format!("Growth estimation failed for {failed} curve(s).")));
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = SimulationConfig {
        curves: args.curves,
        hours: args.hours,
        points_per_hour: args.points_per_hour,
        seed: args.seed,
        noise_sd: args.noise_sd,
        jump_prob: args.jump_prob,
        n0: args.n0,
        ..SimulationConfig::default()
    };
    let sample = generate_sample(&config)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::new(2, format!("Failed to create sample TSV '{}': {e}", path.display())))?;
            crate::io::export::write_sample_tsv(file, &sample)?;
            info!(path = %path.display(), curves = sample.curves.len(), "wrote synthetic sample");
        }
        None => crate::io::export::write_sample_tsv(io::stdout().lock(), &sample)?,
    }
    Ok(())
}

/// Overlay CLI flags on `base`.
pub fn estimator_config_from_args(args: &EstimateArgs, base: EstimatorConfig) -> EstimatorConfig {
    let mut config = base;

    if let Some(n0) = args.n0 {
        config.n0 = n0;
    }
    config.constrain_n0 |= args.constrain_n0;
    config.segment_log_n0 |= args.segment_log_n0;

    if let Some(v) = args.curve_minimum_duration {
        config.curve_minimum_duration_hours = v;
    }
    if let Some(v) = args.phase_minimum_duration {
        config.phase_minimum_duration_hours = v;
    }
    if let Some(v) = args.phase_minimum_slope {
        config.phase_minimum_slope = v;
    }
    if let Some(v) = args.phase_minimum_snr {
        config.phase_minimum_signal_noise_ratio = v;
    }
    if let Some(v) = args.phase_rank_exclude_below {
        config.phase_rank_exclude_below = v;
    }
    if !args.rank_weights.is_empty() {
        config.phase_rank_weights = args.rank_weights.iter().copied().collect::<MetricMap>();
    }

    config
}

fn read_config_file(path: &Path) -> Result<EstimatorConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid config JSON '{}': {e}", path.display())))
}
