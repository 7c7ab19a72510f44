use aus::spectrum;
use aus::WindowType;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StftConfig {
    /// FFT size, which is also the segment width in frames.
    pub window_length: usize,
    /// Hop as a fraction of `window_length`.
    pub hop_scale: f64,
    #[serde(default)]
    pub normalize: bool,
}

impl StftConfig {
    pub fn new(window_length: usize, hop_scale: f64, normalize: bool) -> Self {
        Self {
            window_length,
            hop_scale,
            normalize,
        }
    }

    pub fn hop_length(&self) -> usize {
        (self.window_length as f64 * self.hop_scale).floor() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_length < 2 {
            return Err(FeatureError::invalid(format!(
                "window_length must be at least 2, got {}",
                self.window_length
            )));
        }
        if !(self.hop_scale > 0.0 && self.hop_scale.is_finite()) || self.hop_length() == 0 {
            return Err(FeatureError::invalid(format!(
                "hop_scale {} gives an empty hop for window {}",
                self.hop_scale, self.window_length
            )));
        }
        if self.hop_scale > 1.0 {
            return Err(FeatureError::invalid(format!(
                "hop_scale {} skips frames between windows, must be at most 1",
                self.hop_scale
            )));
        }
        Ok(())
    }
}

/// Magnitude STFT with shape `(frequency bins, frames)`.
///
/// Frames are centred: the signal is zero-padded by half a window on both
/// sides before framing with a Hann window.
pub fn extract_stft(samples: &[f32], config: &StftConfig) -> Result<Array2<f64>> {
    config.validate()?;
    if samples.is_empty() {
        return Err(FeatureError::empty("no samples to transform"));
    }

    let pad = config.window_length / 2;
    let mut padded = vec![0.0_f64; samples.len() + 2 * pad];
    for (slot, &sample) in padded[pad..].iter_mut().zip(samples) {
        *slot = sample as f64;
    }

    let stft = spectrum::rstft(
        &padded,
        config.window_length,
        config.hop_length(),
        WindowType::Hanning,
    );
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    let mut matrix = frames_to_matrix(&magnitude)?;
    if config.normalize {
        normalize_columns(&mut matrix);
    }
    Ok(matrix)
}

fn frames_to_matrix(frames: &[Vec<f64>]) -> Result<Array2<f64>> {
    let bins = frames.first().map(|frame| frame.len()).unwrap_or(0);
    if frames.is_empty() || bins == 0 {
        return Err(FeatureError::empty("STFT produced no frames"));
    }
    let mut matrix = Array2::zeros((bins, frames.len()));
    for (mut column, frame) in matrix.axis_iter_mut(Axis(1)).zip(frames) {
        if frame.len() != bins {
            return Err(FeatureError::ComputationError(format!(
                "ragged STFT frame: {} bins, expected {bins}",
                frame.len()
            )));
        }
        for (cell, &value) in column.iter_mut().zip(frame) {
            *cell = value;
        }
    }
    Ok(matrix)
}

/// Scale every frame (column) by its peak magnitude so it lies in `[0, 1]`.
/// Silent frames are left untouched.
pub fn normalize_columns(matrix: &mut Array2<f64>) {
    for mut column in matrix.axis_iter_mut(Axis(1)) {
        let peak = column.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if peak > f64::MIN_POSITIVE {
            column.mapv_inplace(|v| v / peak);
        }
    }
}
