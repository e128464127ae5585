//! Synthetic input data.

pub mod sample;

pub use sample::{generate_sample, SampleData, SimulationConfig, SyntheticCurve};
