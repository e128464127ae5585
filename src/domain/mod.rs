//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the time series container (`TimeSeries`, `Sample`) and time units
//! - growth phases, raw (`RawGrowthPhase`) and fitted (`GrowthPhase`)
//! - the estimator output (`AnnotatedCurve`) and configuration (`EstimatorConfig`)

pub mod types;

pub use types::*;
