//! Input/output helpers.
//!
//! - TSV ingest + validation (`ingest`)
//! - phase and sample TSV exports (`export`)
//! - annotated curve JSON (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
