//! Global tempo from the autocorrelation of an onset-strength envelope.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::features::stft::{extract_stft, StftConfig};

const N_FFT: usize = 2048;
const HOP_SCALE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    #[serde(default = "default_min_bpm")]
    pub min_bpm: f64,
    #[serde(default = "default_max_bpm")]
    pub max_bpm: f64,
    /// Centre of the log-normal tempo prior.
    #[serde(default = "default_prior_bpm")]
    pub prior_bpm: f64,
}

fn default_min_bpm() -> f64 {
    30.0
}

fn default_max_bpm() -> f64 {
    300.0
}

fn default_prior_bpm() -> f64 {
    120.0
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            prior_bpm: default_prior_bpm(),
        }
    }
}

pub fn estimate_tempo(samples: &[f32], sample_rate: u32, config: &TempoConfig) -> Result<f64> {
    if !(config.min_bpm > 0.0 && config.max_bpm > config.min_bpm && config.prior_bpm > 0.0) {
        return Err(FeatureError::invalid(format!(
            "tempo range {}..{} (prior {}) is not usable",
            config.min_bpm, config.max_bpm, config.prior_bpm
        )));
    }
    let stft_config = StftConfig::new(N_FFT, HOP_SCALE, false);
    let magnitude = extract_stft(samples, &stft_config)?;
    let envelope = onset_envelope(&magnitude);

    let frames_per_second = sample_rate as f64 / stft_config.hop_length() as f64;
    let min_lag = ((60.0 * frames_per_second / config.max_bpm).ceil() as usize).max(1);
    let max_lag = ((60.0 * frames_per_second / config.min_bpm).floor() as usize)
        .min(envelope.len().saturating_sub(1));
    if max_lag <= min_lag {
        return Err(FeatureError::insufficient(format!(
            "{} onset frames cannot resolve tempi down to {} BPM",
            envelope.len(),
            config.max_bpm
        )));
    }

    let autocorr = autocorrelate(&envelope, max_lag + 1);
    if autocorr[0] <= 0.0 {
        return Err(FeatureError::insufficient("no onset energy"));
    }
    let bpm_at = |lag: f64| 60.0 * frames_per_second / lag;
    let score = |lag: usize| autocorr[lag].max(0.0) * prior(bpm_at(lag as f64), config.prior_bpm);

    let best = (min_lag..=max_lag)
        .max_by(|&a, &b| score(a).total_cmp(&score(b)))
        .unwrap_or(min_lag);
    if score(best) <= 0.0 {
        return Err(FeatureError::insufficient("onset envelope has no periodicity"));
    }

    // parabolic refinement between neighbouring lags
    let refined = if best > min_lag && best < max_lag {
        let (left, centre, right) = (score(best - 1), score(best), score(best + 1));
        let curvature = left - 2.0 * centre + right;
        if curvature < 0.0 {
            best as f64 + 0.5 * (left - right) / curvature
        } else {
            best as f64
        }
    } else {
        best as f64
    };
    Ok(bpm_at(refined))
}

/// Positive spectral flux per frame, mean removed.
fn onset_envelope(magnitude: &Array2<f64>) -> Vec<f64> {
    let frames: Vec<_> = magnitude.axis_iter(Axis(1)).collect();
    let mut flux = Vec::with_capacity(frames.len());
    flux.push(0.0);
    for pair in frames.windows(2) {
        let sum: f64 = pair[1]
            .iter()
            .zip(pair[0].iter())
            .map(|(curr, prev)| (curr - prev).max(0.0).powi(2))
            .sum();
        flux.push(sum.sqrt());
    }
    let mean = flux.iter().sum::<f64>() / flux.len().max(1) as f64;
    flux.iter().map(|v| v - mean).collect()
}

fn autocorrelate(signal: &[f64], lags: usize) -> Vec<f64> {
    (0..lags)
        .map(|lag| {
            signal[lag..]
                .iter()
                .zip(signal)
                .map(|(a, b)| a * b)
                .sum::<f64>()
        })
        .collect()
}

/// Log-normal weight, one octave wide, centred on `centre_bpm`.
fn prior(bpm: f64, centre_bpm: f64) -> f64 {
    let octaves = (bpm / centre_bpm).log2();
    (-0.5 * octaves * octaves).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_peaks_at_centre() {
        assert!((prior(120.0, 120.0) - 1.0).abs() < 1e-12);
        assert!(prior(60.0, 120.0) < 0.7);
        assert!((prior(60.0, 120.0) - prior(240.0, 120.0)).abs() < 1e-12);
    }

    #[test]
    fn silence_has_no_tempo() {
        let samples = vec![0.0_f32; 22_050 * 4];
        let err = estimate_tempo(&samples, 22_050, &TempoConfig::default()).unwrap_err();
        assert!(matches!(err, FeatureError::InsufficientData(_)));
    }

    #[test]
    fn autocorrelation_of_impulse_train() {
        let mut signal = vec![0.0; 20];
        for i in (0..20).step_by(5) {
            signal[i] = 1.0;
        }
        let ac = autocorrelate(&signal, 11);
        assert_eq!(ac[0], 4.0);
        assert_eq!(ac[5], 3.0);
        assert_eq!(ac[3], 0.0);
    }
}
