//! Higuchi fractal dimension.

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::features::fit::least_squares_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HfdConfig {
    pub kmax: usize,
    #[serde(default)]
    pub normalize: bool,
}

impl HfdConfig {
    pub fn new(kmax: usize, normalize: bool) -> Self {
        Self { kmax, normalize }
    }
}

/// Higuchi fractal dimension of `samples` over scales `1..=kmax`.
///
/// `L(k)` is the mean normalised curve length over the `k` offsets; the
/// dimension is the slope of `ln L(k)` against `ln(1/k)`.
pub fn compute_hfd(samples: &[f32], kmax: usize, normalize: bool) -> Result<f64> {
    let n = samples.len();
    if n == 0 {
        return Err(FeatureError::invalid("HFD needs a non-empty signal"));
    }
    if kmax == 0 || kmax >= n {
        return Err(FeatureError::invalid(format!(
            "kmax ({kmax}) must be in 1..{n} for a signal of {n} samples"
        )));
    }

    let signal = prepare(samples, normalize);
    let mut log_inverse_k = Vec::with_capacity(kmax);
    let mut log_length = Vec::with_capacity(kmax);
    for k in 1..=kmax {
        let length = curve_length(&signal, k);
        if length > 0.0 && length.is_finite() {
            log_inverse_k.push((1.0 / k as f64).ln());
            log_length.push(length.ln());
        }
    }

    if log_length.len() < 2 {
        return Err(FeatureError::insufficient(format!(
            "only {} positive curve lengths for kmax={kmax}",
            log_length.len()
        )));
    }

    let fit = least_squares_line(&log_inverse_k, &log_length)?;
    Ok(fit.slope)
}

fn prepare(samples: &[f32], normalize: bool) -> Vec<f64> {
    let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
    if !normalize {
        return signal;
    }
    let count = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / count;
    let variance = signal.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();
    if std_dev > 0.0 {
        signal.iter().map(|v| (v - mean) / std_dev).collect()
    } else {
        signal.iter().map(|v| v - mean).collect()
    }
}

/// Mean of `L(m, k)` over the offsets `m = 1..=k` that yield a sub-series.
fn curve_length(signal: &[f64], k: usize) -> f64 {
    let n = signal.len();
    let mut total = 0.0;
    let mut offsets = 0usize;
    for m in 1..=k {
        let count = (n - m) / k;
        if count == 0 {
            continue;
        }
        // the last index of the sub-series is left out on purpose
        let start = m - 1;
        let sum: f64 = (1..count)
            .map(|i| (signal[start + i * k] - signal[start + (i - 1) * k]).abs())
            .sum();
        let norm_factor = (n - 1) as f64 / (k * count * k) as f64;
        total += sum * norm_factor;
        offsets += 1;
    }
    if offsets == 0 {
        0.0
    } else {
        total / offsets as f64
    }
}
