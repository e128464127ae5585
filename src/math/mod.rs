//! Numerical building blocks: robust statistics, least squares, splines and
//! Savitzky–Golay derivatives.

pub mod ols;
pub mod savgol;
pub mod spline;
pub mod stats;

pub use ols::*;
pub use savgol::*;
pub use spline::*;
pub use stats::*;
