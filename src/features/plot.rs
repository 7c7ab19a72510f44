//! Minimal SVG rendering of a log-log scaling fit.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{FeatureError, Result};
use crate::features::fit::LineFit;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;
const MARGIN: f64 = 56.0;

/// Write the plot to `path`, creating parent directories as needed.
pub fn write_loglog(path: &Path, log_x: &[f64], log_y: &[f64], fit: &LineFit) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| FeatureError::storage(parent, err))?;
    }
    std::fs::write(path, render(log_x, log_y, fit)).map_err(|err| FeatureError::storage(path, err))
}

/// Write the plot to a fresh temporary file that outlives this process.
pub fn write_loglog_temp(log_x: &[f64], log_y: &[f64], fit: &LineFit) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("dfa-")
        .suffix(".svg")
        .tempfile()
        .map_err(|err| FeatureError::storage(std::env::temp_dir(), err))?;
    file.write_all(render(log_x, log_y, fit).as_bytes())
        .map_err(|err| FeatureError::storage(file.path(), err))?;
    let (_, path) = file
        .keep()
        .map_err(|err| FeatureError::storage(err.file.path().to_path_buf(), err.error))?;
    Ok(path)
}

fn render(log_x: &[f64], log_y: &[f64], fit: &LineFit) -> String {
    let (x_min, x_max) = bounds(log_x.iter().copied());
    let fitted: Vec<f64> = [x_min, x_max].iter().map(|&x| fit.eval(x)).collect();
    let (y_min, y_max) = bounds(log_y.iter().chain(fitted.iter()).copied());

    let sx = |x: f64| MARGIN + (x - x_min) / (x_max - x_min) * (WIDTH - 2.0 * MARGIN);
    let sy = |y: f64| HEIGHT - MARGIN - (y - y_min) / (y_max - y_min) * (HEIGHT - 2.0 * MARGIN);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<path d="M{m} {b} H{r} M{m} {b} V{m}" stroke="black" fill="none"/>"#,
        m = MARGIN,
        b = HEIGHT - MARGIN,
        r = WIDTH - MARGIN
    );
    for (&x, &y) in log_x.iter().zip(log_y) {
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.2}" cy="{:.2}" r="3.5" fill="steelblue"/>"#,
            sx(x),
            sy(y)
        );
    }
    let _ = writeln!(
        svg,
        r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="firebrick" stroke-width="1.5"/>"#,
        sx(x_min),
        sy(fitted[0]),
        sx(x_max),
        sy(fitted[1])
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-family="sans-serif" font-size="14">log n</text>"#,
        WIDTH / 2.0,
        HEIGHT - MARGIN / 3.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-family="sans-serif" font-size="14">log F(n)   slope = {:.4}</text>"#,
        MARGIN,
        MARGIN / 2.0,
        fit.slope
    );
    svg.push_str("</svg>\n");
    svg
}

/// Finite bounds with a non-zero span.
fn bounds(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        (0.0, 1.0)
    } else if hi - lo < 1e-12 {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}
