//! Terminal rendering of annotated curves.

pub mod ascii;

pub use ascii::render_ascii_plot;
