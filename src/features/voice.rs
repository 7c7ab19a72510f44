//! Local jitter and shimmer of voiced speech.
//!
//! Cycle lengths come from the pitch track: every voiced frame contributes a
//! period `1 / f0` and the peak amplitude of the signal over one period
//! centred on the frame. Jitter is the mean absolute difference between
//! consecutive periods divided by the mean period; shimmer is the same ratio
//! for the peak amplitudes. Only frames that are adjacent in the track count
//! as consecutive, so unvoiced gaps never contribute a difference.

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::features::pitch::{PitchConfig, PitchFrame, PitchTracker};
use crate::types::SampleBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceQualityConfig {
    #[serde(default = "default_floor")]
    pub floor_hz: f64,
    #[serde(default = "default_ceiling")]
    pub ceiling_hz: f64,
    /// Corner frequency of a first-order pre-emphasis filter applied first.
    #[serde(default)]
    pub preemphasis_hz: Option<f64>,
}

fn default_floor() -> f64 {
    75.0
}

fn default_ceiling() -> f64 {
    500.0
}

impl Default for VoiceQualityConfig {
    fn default() -> Self {
        Self {
            floor_hz: default_floor(),
            ceiling_hz: default_ceiling(),
            preemphasis_hz: None,
        }
    }
}

impl VoiceQualityConfig {
    pub fn with_preemphasis(mut self, hz: f64) -> Self {
        self.preemphasis_hz = Some(hz);
        self
    }

    /// Pitch tracking settings covering the same F0 range.
    pub fn pitch_config(&self) -> PitchConfig {
        PitchConfig {
            floor_hz: self.floor_hz,
            ceiling_hz: self.ceiling_hz,
            ..PitchConfig::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.floor_hz > 0.0 && self.ceiling_hz > self.floor_hz) {
            return Err(FeatureError::invalid(format!(
                "voice range {}..{} Hz is empty",
                self.floor_hz, self.ceiling_hz
            )));
        }
        if let Some(hz) = self.preemphasis_hz {
            if !(hz > 0.0 && hz.is_finite()) {
                return Err(FeatureError::invalid(format!(
                    "pre-emphasis corner {hz} Hz must be positive"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceQuality {
    /// Local jitter as a fraction of the mean period.
    pub jitter: f64,
    /// Local shimmer as a fraction of the mean peak amplitude.
    pub shimmer: f64,
}

pub fn measure_voice_quality(
    buffer: &SampleBuffer,
    config: &VoiceQualityConfig,
    tracker: &dyn PitchTracker,
) -> Result<VoiceQuality> {
    config.validate()?;
    if buffer.is_empty() {
        return Err(FeatureError::empty("no samples to measure"));
    }

    let emphasised;
    let buffer = match config.preemphasis_hz {
        Some(hz) => {
            emphasised = SampleBuffer::new(
                pre_emphasis(&buffer.samples, buffer.sample_rate, hz),
                buffer.sample_rate,
            );
            &emphasised
        }
        None => buffer,
    };

    let frames = tracker.f0_candidates(buffer)?;
    let cycles = voiced_cycles(buffer, &frames, config);
    let periods: Vec<Vec<f64>> = cycles
        .iter()
        .map(|run| run.iter().map(|cycle| cycle.period).collect())
        .collect();
    let amplitudes: Vec<Vec<f64>> = cycles
        .iter()
        .map(|run| run.iter().map(|cycle| cycle.peak).collect())
        .collect();

    Ok(VoiceQuality {
        jitter: local_perturbation(&periods)?,
        shimmer: local_perturbation(&amplitudes)?,
    })
}

/// `y[n] = x[n] - a * x[n-1]` with `a = exp(-2 pi f / rate)`.
pub fn pre_emphasis(samples: &[f32], sample_rate: u32, from_hz: f64) -> Vec<f32> {
    let alpha = (-2.0 * std::f64::consts::PI * from_hz / sample_rate as f64).exp() as f32;
    let mut previous = 0.0_f32;
    samples
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let y = if i == 0 { x } else { x - alpha * previous };
            previous = x;
            y
        })
        .collect()
}

/// Mean absolute difference of neighbours within each run over the mean of all values.
pub fn local_perturbation(runs: &[Vec<f64>]) -> Result<f64> {
    let mut diff_sum = 0.0;
    let mut pairs = 0usize;
    for run in runs {
        for pair in run.windows(2) {
            diff_sum += (pair[1] - pair[0]).abs();
            pairs += 1;
        }
    }
    if pairs == 0 {
        return Err(FeatureError::insufficient(
            "no two consecutive voiced cycles",
        ));
    }

    let count: usize = runs.iter().map(Vec::len).sum();
    let mean = runs.iter().flatten().sum::<f64>() / count as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return Err(FeatureError::insufficient(format!(
            "mean cycle value {mean} cannot scale the perturbation"
        )));
    }
    Ok(diff_sum / pairs as f64 / mean)
}

#[derive(Debug, Clone, Copy)]
struct Cycle {
    period: f64,
    peak: f64,
}

/// Runs of cycles from frames that are adjacent in the track.
fn voiced_cycles(
    buffer: &SampleBuffer,
    frames: &[PitchFrame],
    config: &VoiceQualityConfig,
) -> Vec<Vec<Cycle>> {
    let rate = buffer.sample_rate as f64;
    let mut runs: Vec<Vec<Cycle>> = Vec::new();
    let mut current: Vec<Cycle> = Vec::new();
    let mut last_index: Option<usize> = None;

    for frame in frames {
        let f0 = frame
            .candidates
            .iter()
            .copied()
            .max_by(|a, b| a.total_cmp(b))
            .filter(|&f0| f0 >= config.floor_hz && f0 <= config.ceiling_hz);
        let cycle = f0.and_then(|f0| {
            let period = 1.0 / f0;
            let start = ((frame.time_secs - period / 2.0) * rate).round().max(0.0) as usize;
            let end = (((frame.time_secs + period / 2.0) * rate).round().max(0.0) as usize)
                .min(buffer.len());
            (start < end).then(|| Cycle {
                period,
                peak: buffer.samples[start..end]
                    .iter()
                    .fold(0.0_f64, |peak, &s| peak.max(s.abs() as f64)),
            })
        });

        let adjacent = last_index.map(|last| last + 1 == frame.index).unwrap_or(false);
        match cycle {
            Some(cycle) => {
                if !adjacent && !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
                current.push(cycle);
                last_index = Some(frame.index);
            }
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
                last_index = None;
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}
