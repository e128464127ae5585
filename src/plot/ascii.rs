//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - clean points: `o`
//! - outliers: `x`
//! - fitted exponential over each growth phase: `-`

use crate::domain::{AnnotatedCurve, GrowthPhase};

/// Render an annotated curve.
pub fn render_ascii_plot(curve: &AnnotatedCurve, width: usize, height: usize) -> String {
    let time = time_range(curve).unwrap_or((0.0, 1.0));
    let (lo, hi) = value_range(curve).unwrap_or((0.0, 1.0));
    let pad = ((hi - lo) * 0.05).max(1e-12);
    let mut canvas = Canvas::new(width.max(10), height.max(5), time, (lo - pad, hi + pad));

    // Fits first, so points overlay them.
    for phase in &curve.growth_phases {
        canvas.trace(phase);
    }
    for (points, ch) in [(&curve.series, 'o'), (&curve.outliers, 'x')] {
        for s in points.iter().filter(|s| s.value.is_finite()) {
            canvas.mark(s.time, s.value, ch);
        }
    }

    canvas.render()
}

/// Character grid over a time x value window; row 0 is the top.
struct Canvas {
    grid: Vec<Vec<char>>,
    time: (f64, f64),
    value: (f64, f64),
}

impl Canvas {
    fn new(width: usize, height: usize, time: (f64, f64), value: (f64, f64)) -> Self {
        Self {
            grid: vec![vec![' '; width]; height],
            time,
            value,
        }
    }

    fn width(&self) -> usize {
        self.grid[0].len()
    }

    fn height(&self) -> usize {
        self.grid.len()
    }

    fn column(&self, t: f64) -> usize {
        let (t0, t1) = self.time;
        let u = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
        (u * (self.width() - 1) as f64).round() as usize
    }

    fn column_time(&self, column: usize) -> f64 {
        let (t0, t1) = self.time;
        t0 + (t1 - t0) * column as f64 / (self.width() - 1) as f64
    }

    fn row(&self, y: f64) -> usize {
        let (y0, y1) = self.value;
        let u = ((y - y0) / (y1 - y0)).clamp(0.0, 1.0);
        ((1.0 - u) * (self.height() - 1) as f64).round() as usize
    }

    fn mark(&mut self, t: f64, y: f64, ch: char) {
        let (row, column) = (self.row(y), self.column(t));
        self.grid[row][column] = ch;
    }

    /// Draw the phase's fitted exponential, one cell per column between its
    /// start and end, joining columns vertically where the curve is steep.
    fn trace(&mut self, phase: &GrowthPhase) {
        let mut previous: Option<usize> = None;
        for column in self.column(phase.start)..=self.column(phase.end) {
            let t = self.column_time(column).max(phase.start).min(phase.end);
            let y = phase.predict(t);
            if !y.is_finite() {
                continue;
            }
            let row = self.row(y);
            let (top, bottom) = match previous {
                Some(p) => (row.min(p), row.max(p)),
                None => (row, row),
            };
            for r in top..=bottom {
                if self.grid[r][column] == ' ' {
                    self.grid[r][column] = '-';
                }
            }
            previous = Some(row);
        }
    }

    fn render(self) -> String {
        let (t0, t1) = self.time;
        let (y0, y1) = self.value;
        let mut out = format!("Plot: time=[{t0:.3}, {t1:.3}] h | y=[{y0:.2}, {y1:.2}]\n");
        for row in self.grid {
            out.extend(row);
            out.push('\n');
        }
        out
    }
}

fn time_range(curve: &AnnotatedCurve) -> Option<(f64, f64)> {
    span(curve.series.times().iter().chain(curve.outliers.times()).copied())
}

/// Observed values plus each fit's endpoints (the fits are monotone).
fn value_range(curve: &AnnotatedCurve) -> Option<(f64, f64)> {
    let observed = curve.series.values().iter().chain(curve.outliers.values()).copied();
    let fitted = curve
        .growth_phases
        .iter()
        .flat_map(|p| [p.predict(p.start), p.predict(p.end)]);
    span(observed.chain(fitted))
}

fn span(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (hi > lo).then_some((lo, hi))
}
