//! `growth-curves` library crate.
//!
//! The binary (`growth`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the estimator can be embedded directly (`estimation::estimate`)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod estimation;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;

pub use estimation::{estimate, Estimator};
