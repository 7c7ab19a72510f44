//! Detrended fluctuation analysis.
//!
//! Historically extracted as "DFA2", but the detrending order is a free
//! parameter: [`DfaConfig::dfa2`] is only the second-order preset.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FeatureError, Result};
use crate::features::fit::{fit_polynomial, least_squares_line, robust_line, LineFit};
use crate::features::plot;

/// Growth factor between consecutive default window sizes.
const DEFAULT_WINDOW_FACTOR: f64 = 1.2;
/// Largest default window as a fraction of the signal length.
const DEFAULT_MAX_FRACTION: f64 = 0.1;

/// How local trends are modelled inside each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendFit {
    #[default]
    Polynomial,
}

/// How the scaling exponent is read off the log-log fluctuation curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExponentFit {
    LeastSquares,
    #[default]
    Robust,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebugPlot {
    #[default]
    Off,
    /// Write the plot to a kept temporary file.
    TempFile,
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DfaConfig {
    /// Explicit scales; `None` derives a log-spaced set from the signal length.
    #[serde(default)]
    pub window_sizes: Option<Vec<usize>>,
    #[serde(default = "default_overlap")]
    pub overlap: bool,
    #[serde(default = "default_order")]
    pub detrend_order: usize,
    #[serde(default)]
    pub trend_fit: TrendFit,
    #[serde(default)]
    pub exponent_fit: ExponentFit,
    #[serde(default)]
    pub debug_plot: DebugPlot,
    #[serde(default)]
    pub robust_deadline: Option<Duration>,
}

fn default_overlap() -> bool {
    true
}

fn default_order() -> usize {
    1
}

impl Default for DfaConfig {
    fn default() -> Self {
        Self::reference_default()
    }
}

impl DfaConfig {
    /// First-order detrending with overlapping windows and a robust exponent fit.
    pub fn reference_default() -> Self {
        Self {
            window_sizes: None,
            overlap: true,
            detrend_order: 1,
            trend_fit: TrendFit::Polynomial,
            exponent_fit: ExponentFit::Robust,
            debug_plot: DebugPlot::Off,
            robust_deadline: None,
        }
    }

    /// Second-order detrending.
    pub fn dfa2() -> Self {
        Self {
            detrend_order: 2,
            ..Self::reference_default()
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.detrend_order = order;
        self
    }

    pub fn with_window_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.window_sizes = Some(sizes);
        self
    }

    pub fn with_overlap(mut self, overlap: bool) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_exponent_fit(mut self, fit: ExponentFit) -> Self {
        self.exponent_fit = fit;
        self
    }

    pub fn with_debug_plot(mut self, plot: DebugPlot) -> Self {
        self.debug_plot = plot;
        self
    }

    pub fn with_robust_deadline(mut self, deadline: Duration) -> Self {
        self.robust_deadline = Some(deadline);
        self
    }

    /// Smallest window that still over-determines the detrending polynomial.
    pub fn min_window(&self) -> usize {
        4 * self.detrend_order
    }

    fn stride(&self, window: usize) -> usize {
        if self.overlap {
            (window / 2).max(1)
        } else {
            window
        }
    }
}

#[derive(Debug, Clone)]
pub struct DfaOutcome {
    pub exponent: f64,
    /// `(window size, F(n))` for every scale that entered the fit.
    pub fluctuations: Vec<(usize, f64)>,
    pub fit: LineFit,
    pub debug_plot: Option<PathBuf>,
}

/// Scaling exponent of `samples` under `config`.
pub fn compute_dfa(samples: &[f32], config: &DfaConfig) -> Result<DfaOutcome> {
    let n = samples.len();
    if n == 0 {
        return Err(FeatureError::empty("DFA needs at least one sample"));
    }
    if config.detrend_order == 0 {
        return Err(FeatureError::invalid("detrend_order must be at least 1"));
    }
    let windows = match &config.window_sizes {
        Some(sizes) => {
            validate_windows(sizes, n, config.min_window())?;
            sizes.clone()
        }
        None => default_window_sizes(n, config.min_window())?,
    };

    let profile = integrate(samples);
    let mut fluctuations = Vec::with_capacity(windows.len());
    for &window in &windows {
        let value =
            fluctuation(&profile, window, config).map_err(as_computation_error("detrending"))?;
        if value > 0.0 && value.is_finite() {
            fluctuations.push((window, value));
        } else {
            debug!(window, value, "dropping degenerate fluctuation");
        }
    }
    if fluctuations.len() < 2 {
        return Err(FeatureError::insufficient(format!(
            "{} usable scales out of {}",
            fluctuations.len(),
            windows.len()
        )));
    }

    let log_n: Vec<f64> = fluctuations.iter().map(|(w, _)| (*w as f64).ln()).collect();
    let log_f: Vec<f64> = fluctuations.iter().map(|(_, f)| f.ln()).collect();
    let fit = match config.exponent_fit {
        ExponentFit::LeastSquares => least_squares_line(&log_n, &log_f),
        ExponentFit::Robust => robust_line(&log_n, &log_f, config.robust_deadline),
    }
    .map_err(as_computation_error("exponent fit"))?;

    let debug_plot = match &config.debug_plot {
        DebugPlot::Off => None,
        DebugPlot::TempFile => Some(plot::write_loglog_temp(&log_n, &log_f, &fit)?),
        DebugPlot::Path(path) => {
            plot::write_loglog(path, &log_n, &log_f, &fit)?;
            Some(path.clone())
        }
    };

    Ok(DfaOutcome {
        exponent: fit.slope,
        fluctuations,
        fit,
        debug_plot,
    })
}

fn validate_windows(sizes: &[usize], len: usize, min_window: usize) -> Result<()> {
    if sizes.is_empty() {
        return Err(FeatureError::invalid("window_sizes must not be empty"));
    }
    if let Some(&bad) = sizes.iter().find(|&&w| w >= len) {
        return Err(FeatureError::invalid(format!(
            "window size {bad} must be smaller than the signal length {len}"
        )));
    }
    if let Some(&bad) = sizes.iter().find(|&&w| w < min_window) {
        return Err(FeatureError::invalid(format!(
            "window size {bad} is below the minimum {min_window} for this detrend order"
        )));
    }
    Ok(())
}

/// Log-spaced window sizes from `min_window` up to a tenth of the signal.
pub fn default_window_sizes(len: usize, min_window: usize) -> Result<Vec<usize>> {
    let max_window = DEFAULT_MAX_FRACTION * len as f64;
    if max_window <= min_window as f64 {
        return Err(FeatureError::insufficient(format!(
            "signal of {len} samples is too short for windows of at least {min_window}"
        )));
    }
    let steps = ((max_window / min_window as f64).ln() / DEFAULT_WINDOW_FACTOR.ln()).floor() as i32;
    let mut sizes = vec![min_window];
    for i in 0..=steps {
        let size = (min_window as f64 * DEFAULT_WINDOW_FACTOR.powi(i)).floor() as usize;
        if size > *sizes.last().unwrap_or(&0) {
            sizes.push(size);
        }
    }
    Ok(sizes)
}

fn integrate(samples: &[f32]) -> Vec<f64> {
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    samples
        .iter()
        .scan(0.0, |acc, &s| {
            *acc += s as f64 - mean;
            Some(*acc)
        })
        .collect()
}

/// RMS over windows of the per-window RMS residual around the local trend.
/// Internal fit failures surface as `ComputationError`; too little data stays as is.
fn as_computation_error(stage: &'static str) -> impl Fn(FeatureError) -> FeatureError {
    move |err| match err {
        FeatureError::InsufficientData(_) | FeatureError::ComputationError(_) => err,
        other => FeatureError::ComputationError(format!("{stage} failed: {other}")),
    }
}

fn fluctuation(profile: &[f64], window: usize, config: &DfaConfig) -> Result<f64> {
    let stride = config.stride(window);
    let abscissa: Vec<f64> = (0..window).map(|i| i as f64).collect();
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    let mut start = 0;
    while start + window <= profile.len() {
        let segment = &profile[start..start + window];
        let trend = match config.trend_fit {
            TrendFit::Polynomial => fit_polynomial(&abscissa, segment, config.detrend_order)?,
        };
        let residual_sq = abscissa
            .iter()
            .zip(segment)
            .map(|(&x, &y)| (y - trend.eval(x)).powi(2))
            .sum::<f64>()
            / window as f64;
        sum_sq += residual_sq;
        count += 1;
        start += stride;
    }
    if count == 0 {
        return Ok(0.0);
    }
    Ok((sum_sq / count as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_are_increasing_and_bounded() {
        let sizes = default_window_sizes(10_000, 8).unwrap();
        assert_eq!(sizes[0], 8);
        assert!(sizes.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(*sizes.last().unwrap() as f64 <= 1_000.0);
        assert!(sizes.len() > 10);
    }

    #[test]
    fn short_signal_has_no_default_windows() {
        let err = default_window_sizes(50, 8).unwrap_err();
        assert!(matches!(err, FeatureError::InsufficientData(_)));
    }

    #[test]
    fn rejects_window_below_order_minimum() {
        let samples = vec![0.5_f32; 256];
        let config = DfaConfig::dfa2().with_window_sizes(vec![4, 16, 32]);
        let err = compute_dfa(&samples, &config).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidParameter(_)));
    }

    #[test]
    fn rejects_zero_order() {
        let samples = vec![0.5_f32; 256];
        let config = DfaConfig::reference_default().with_order(0);
        assert!(matches!(
            compute_dfa(&samples, &config),
            Err(FeatureError::InvalidParameter(_))
        ));
    }

    #[test]
    fn polynomial_profile_has_no_fluctuation() {
        // a constant signal integrates to a flat profile
        let samples = vec![0.3_f32; 512];
        let config = DfaConfig::reference_default().with_window_sizes(vec![8, 16, 32]);
        let err = compute_dfa(&samples, &config).unwrap_err();
        assert!(matches!(err, FeatureError::InsufficientData(_)));
    }

    #[test]
    fn singular_detrending_is_a_computation_error() {
        // degree-30 normal equations over 120 points are numerically singular
        let samples: Vec<f32> = (0..2_000).map(|i| ((i * 7919) % 113) as f32 / 113.0).collect();
        let config = DfaConfig::reference_default()
            .with_order(30)
            .with_window_sizes(vec![120, 240]);
        let err = compute_dfa(&samples, &config).unwrap_err();
        assert!(matches!(err, FeatureError::ComputationError(_)), "{err:?}");
        assert!(err.to_string().contains("detrending"));
    }

    #[test]
    fn fit_errors_map_to_computation_errors() {
        let map = as_computation_error("detrending");
        assert!(matches!(
            map(FeatureError::NumericalError("singular".into())),
            FeatureError::ComputationError(_)
        ));
        assert!(matches!(
            map(FeatureError::insufficient("short")),
            FeatureError::InsufficientData(_)
        ));
    }

    #[test]
    fn stride_halves_when_overlapping() {
        let config = DfaConfig::reference_default();
        assert_eq!(config.stride(16), 8);
        assert_eq!(config.clone().with_overlap(false).stride(16), 16);
    }
}
