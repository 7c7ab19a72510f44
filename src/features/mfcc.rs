use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

const MIN_FREQ: f64 = 20.0;
const DELTA_WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MfccConfig {
    pub n_mfcc: usize,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop")]
    pub hop_length: usize,
    #[serde(default = "default_mel_bands")]
    pub mel_bands: usize,
    /// Append first and second order deltas after the cepstra.
    #[serde(default)]
    pub deltas: bool,
}

fn default_n_fft() -> usize {
    2048
}

fn default_hop() -> usize {
    512
}

fn default_mel_bands() -> usize {
    128
}

impl MfccConfig {
    pub fn new(n_mfcc: usize) -> Self {
        Self {
            n_mfcc,
            n_fft: default_n_fft(),
            hop_length: default_hop(),
            mel_bands: default_mel_bands(),
            deltas: false,
        }
    }

    pub fn with_deltas(mut self, deltas: bool) -> Self {
        self.deltas = deltas;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_mfcc == 0 || self.n_mfcc > self.mel_bands {
            return Err(FeatureError::invalid(format!(
                "n_mfcc {} must be in 1..={}",
                self.n_mfcc, self.mel_bands
            )));
        }
        if self.n_fft < 2 || self.hop_length == 0 {
            return Err(FeatureError::invalid(format!(
                "n_fft {} / hop {} cannot frame a signal",
                self.n_fft, self.hop_length
            )));
        }
        Ok(())
    }
}

/// Cepstral coefficients with shape `(frames, n_mfcc)`, or
/// `(frames, 3 * n_mfcc)` when deltas are requested.
pub fn compute_mfcc(samples: &[f32], sample_rate: u32, config: &MfccConfig) -> Result<Array2<f64>> {
    config.validate()?;
    if samples.len() < config.n_fft {
        return Err(FeatureError::insufficient(format!(
            "{} samples do not fill one {}-point frame",
            samples.len(),
            config.n_fft
        )));
    }
    let audio: Vec<f64> = samples.iter().map(|&s| s as f64).collect();

    let stft = spectrum::rstft(&audio, config.n_fft, config.hop_length, WindowType::Hanning);
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    let power = analysis::make_power_spectrogram(&magnitude);

    let freqs = spectrum::rfftfreq(config.n_fft, sample_rate);
    let filterbank = MelFilterbank::new(
        MIN_FREQ,
        (sample_rate as f64) / 2.0,
        config.mel_bands,
        &freqs,
        true,
    );
    let mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);
    let cepstra = analysis::mel::mfcc_spectrogram(&mel, config.n_mfcc, None);
    let mfcc = array_from_rows(&cepstra)?;

    if !config.deltas {
        return Ok(mfcc);
    }
    let deltas = delta_matrix(&mfcc, DELTA_WINDOW);
    let delta_deltas = delta_matrix(&deltas, DELTA_WINDOW);
    concatenate(Axis(1), &[mfcc.view(), deltas.view(), delta_deltas.view()])
        .map_err(|err| FeatureError::ComputationError(err.to_string()))
}

fn array_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let cols = rows.first().map(|row| row.len()).unwrap_or(0);
    if rows.is_empty() || cols == 0 {
        return Err(FeatureError::empty("no MFCC frames"));
    }
    let flat: Vec<f64> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    Array2::from_shape_vec((rows.len(), cols), flat)
        .map_err(|err| FeatureError::ComputationError(format!("ragged MFCC frames: {err}")))
}

/// Regression deltas over `±window` frames, clamping at the edges.
fn delta_matrix(input: &Array2<f64>, window: usize) -> Array2<f64> {
    let (frames, coeffs) = input.dim();
    let mut output = Array2::zeros((frames, coeffs));
    if frames == 0 {
        return output;
    }
    let denominator = 2.0 * (1..=window).map(|n| (n * n) as f64).sum::<f64>();

    for t in 0..frames {
        let mut numerator = Array1::<f64>::zeros(coeffs);
        for n in 1..=window {
            let prev = input.row(t.saturating_sub(n));
            let next = input.row((t + n).min(frames - 1));
            numerator += &((&next - &prev) * n as f64);
        }
        output.row_mut(t).assign(&(numerator / denominator));
    }
    output
}
