//! Fundamental-frequency candidates per analysis frame.

use aus::analysis;
use serde::{Deserialize, Serialize};

use crate::audio::resample_to;
use crate::error::{FeatureError, Result};
use crate::types::SampleBuffer;

const TRACKING_RATE: u32 = 16_000;

/// One analysis frame and the F0 candidates found in it (empty when unvoiced).
#[derive(Debug, Clone, PartialEq)]
pub struct PitchFrame {
    pub index: usize,
    /// Centre of the frame in seconds from the start of the recording.
    pub time_secs: f64,
    pub candidates: Vec<f64>,
}

/// Source of per-frame F0 candidates.
pub trait PitchTracker: Send + Sync {
    fn f0_candidates(&self, buffer: &SampleBuffer) -> Result<Vec<PitchFrame>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchConfig {
    #[serde(default = "default_floor")]
    pub floor_hz: f64,
    #[serde(default = "default_ceiling")]
    pub ceiling_hz: f64,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: usize,
}

fn default_floor() -> f64 {
    75.0
}

fn default_ceiling() -> f64 {
    500.0
}

fn default_frame_ms() -> usize {
    25
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            floor_hz: default_floor(),
            ceiling_hz: default_ceiling(),
            frame_ms: default_frame_ms(),
        }
    }
}

/// pYIN tracker working on a 16 kHz copy of the input.
#[derive(Debug, Clone, Default)]
pub struct PyinTracker {
    config: PitchConfig,
}

impl PyinTracker {
    pub fn new(config: PitchConfig) -> Self {
        Self { config }
    }

    fn frame_length(&self) -> usize {
        ((TRACKING_RATE as usize * self.config.frame_ms) / 1000).max(1)
    }
}

impl PitchTracker for PyinTracker {
    fn f0_candidates(&self, buffer: &SampleBuffer) -> Result<Vec<PitchFrame>> {
        let PitchConfig {
            floor_hz,
            ceiling_hz,
            ..
        } = self.config;
        if !(floor_hz > 0.0 && ceiling_hz > floor_hz) {
            return Err(FeatureError::invalid(format!(
                "pitch range {floor_hz}..{ceiling_hz} Hz is empty"
            )));
        }
        let frame_len = self.frame_length();
        if buffer.len() < frame_len {
            return Err(FeatureError::insufficient(format!(
                "{} samples are shorter than one pitch frame",
                buffer.len()
            )));
        }

        let resampled = resample_to(buffer, TRACKING_RATE)?;
        let audio: Vec<f64> = resampled.samples.iter().map(|&s| s as f64).collect();
        let (timestamps, pitches, voiced_flags, _confidence) =
            analysis::pyin_pitch_estimator(&audio, TRACKING_RATE, floor_hz, ceiling_hz, frame_len);
        if pitches.len() != voiced_flags.len() || pitches.len() != timestamps.len() {
            return Err(FeatureError::ExternalTool(format!(
                "pYIN returned {} pitches for {} voicing flags and {} timestamps",
                pitches.len(),
                voiced_flags.len(),
                timestamps.len()
            )));
        }

        Ok(pitches
            .iter()
            .zip(voiced_flags.iter())
            .zip(timestamps.iter())
            .enumerate()
            .map(|(index, ((&pitch, &voiced), &time_secs))| PitchFrame {
                index,
                time_secs,
                candidates: if voiced && pitch.is_finite() && pitch > 0.0 {
                    vec![pitch]
                } else {
                    Vec::new()
                },
            })
            .collect())
    }
}

/// Highest candidate of every frame that has one.
pub fn max_candidate_per_frame(frames: &[PitchFrame]) -> Vec<f64> {
    frames
        .iter()
        .filter_map(|frame| {
            frame
                .candidates
                .iter()
                .copied()
                .max_by(|a, b| a.total_cmp(b))
        })
        .collect()
}
