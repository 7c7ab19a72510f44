pub mod dfa;
pub mod fit;
pub mod hfd;
pub mod mfcc;
pub mod pitch;
pub mod plot;
pub mod segments;
pub mod stft;
pub mod tempo;
pub mod voice;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::RatePolicy;
use crate::error::{FeatureError, Result};
use crate::types::{Feature, SampleBuffer, VectorFeature};

pub use dfa::{compute_dfa, DebugPlot, DfaConfig, DfaOutcome, ExponentFit, TrendFit};
pub use hfd::{compute_hfd, HfdConfig};
pub use mfcc::{compute_mfcc, MfccConfig};
pub use pitch::{PitchConfig, PitchFrame, PitchTracker, PyinTracker};
pub use segments::{segment, segments_to_feature, Segment};
pub use stft::{extract_stft, StftConfig};
pub use tempo::{estimate_tempo, TempoConfig};
pub use voice::{measure_voice_quality, VoiceQuality, VoiceQualityConfig};

/// One estimator invocation, fully parameterised.
///
/// The configuration doubles as the cache key: [`FeatureConfig::path_components`]
/// names the directory its results are stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum FeatureConfig {
    Hfd(HfdConfig),
    Dfa(DfaConfig),
    Stft(StftConfig),
    StftSegmented(StftConfig),
    Mfcc(MfccConfig),
    Tempo(TempoConfig),
    Pitch(PitchConfig),
    VoiceQuality(VoiceQualityConfig),
}

/// Output of one estimator run.
#[derive(Debug, Clone)]
pub struct Computed {
    pub feature: Feature,
    /// Auxiliary file written on the side (DFA debug plot).
    pub artifact: Option<PathBuf>,
}

impl From<Feature> for Computed {
    fn from(feature: Feature) -> Self {
        Self {
            feature,
            artifact: None,
        }
    }
}

impl FeatureConfig {
    pub fn feature_name(&self) -> &'static str {
        match self {
            Self::Hfd(_) => "hfd",
            Self::Dfa(_) => "dfa",
            Self::Stft(_) => "stft",
            Self::StftSegmented(_) => "stft_segmented",
            Self::Mfcc(_) => "mfcc",
            Self::Tempo(_) => "tempo",
            Self::Pitch(_) => "f0",
            Self::VoiceQuality(_) => "voice_quality",
        }
    }

    /// `[feature, "param=value", ...]`, the cache key of this configuration.
    ///
    /// Settings that do not change the stored value (debug plots, deadlines)
    /// are left out.
    pub fn path_components(&self) -> Vec<String> {
        let mut components = vec![self.feature_name().to_string()];
        match self {
            Self::Hfd(config) => {
                components.push(format!("kmax={}", config.kmax));
                components.push(format!("norm={}", config.normalize));
            }
            Self::Dfa(config) => {
                let windows = match &config.window_sizes {
                    Some(sizes) => sizes
                        .iter()
                        .map(|w| w.to_string())
                        .collect::<Vec<_>>()
                        .join("-"),
                    None => "auto".to_string(),
                };
                components.push(format!("nvals={windows}"));
                components.push(format!("overlap={}", config.overlap));
                components.push(format!("order={}", config.detrend_order));
                components.push(format!(
                    "fit_trend={}",
                    match config.trend_fit {
                        TrendFit::Polynomial => "poly",
                    }
                ));
                components.push(format!(
                    "fit_exp={}",
                    match config.exponent_fit {
                        ExponentFit::LeastSquares => "poly",
                        ExponentFit::Robust => "robust",
                    }
                ));
            }
            Self::Stft(config) | Self::StftSegmented(config) => {
                components.push(format!("window={}", config.window_length));
                components.push(format!("hop_length={}", config.hop_length()));
                components.push(format!("norm={}", config.normalize));
            }
            Self::Mfcc(config) => {
                components.push(format!("n_mfcc={}", config.n_mfcc));
                components.push(format!("n_fft={}", config.n_fft));
                components.push(format!("hop_length={}", config.hop_length));
                components.push(format!("mels={}", config.mel_bands));
                components.push(format!("deltas={}", config.deltas));
            }
            Self::Tempo(config) => {
                components.push(format!("bpm={}-{}", config.min_bpm, config.max_bpm));
                components.push(format!("prior={}", config.prior_bpm));
            }
            Self::Pitch(config) => {
                components.push(format!("floor={}", config.floor_hz));
                components.push(format!("ceiling={}", config.ceiling_hz));
                components.push(format!("frame_ms={}", config.frame_ms));
            }
            Self::VoiceQuality(config) => {
                components.push(format!("floor={}", config.floor_hz));
                components.push(format!("ceiling={}", config.ceiling_hz));
                components.push(match config.preemphasis_hz {
                    Some(hz) => format!("preemphasis={hz}"),
                    None => "preemphasis=none".to_string(),
                });
            }
        }
        components
    }

    /// Sample rate the estimator expects its input at.
    pub fn rate_policy(&self, analysis_rate: u32) -> RatePolicy {
        match self {
            // fractal length and pitch tracking work on the file as recorded
            Self::Hfd(_) | Self::Pitch(_) | Self::VoiceQuality(_) => RatePolicy::Native,
            _ => RatePolicy::Fixed(analysis_rate),
        }
    }

    /// Run the estimator on `buffer`, which must already satisfy [`Self::rate_policy`].
    pub fn compute(&self, buffer: &SampleBuffer, tracker: &dyn PitchTracker) -> Result<Computed> {
        let samples = &buffer.samples;
        match self {
            Self::Hfd(config) => {
                compute_hfd(samples, config.kmax, config.normalize).map(|v| Feature::scalar(v).into())
            }
            Self::Dfa(config) => {
                let outcome = compute_dfa(samples, config)?;
                Ok(Computed {
                    feature: Feature::scalar(outcome.exponent),
                    artifact: outcome.debug_plot,
                })
            }
            Self::Stft(config) => {
                let matrix = extract_stft(samples, config)?;
                Ok(Feature::Vector(VectorFeature::from_matrix(&matrix)).into())
            }
            Self::StftSegmented(config) => {
                config.validate()?;
                let matrix = extract_stft(samples, config).map_err(|err| {
                    FeatureError::empty(format!("STFT failed upstream: {err}"))
                })?;
                let segments = segment(&matrix, config)?;
                Ok(Feature::Vector(segments_to_feature(&segments)?).into())
            }
            Self::Mfcc(config) => {
                let matrix = compute_mfcc(samples, buffer.sample_rate, config)?;
                Ok(Feature::Vector(VectorFeature::from_matrix(&matrix)).into())
            }
            Self::Tempo(config) => estimate_tempo(samples, buffer.sample_rate, config)
                .map(|bpm| Feature::scalar(bpm).into()),
            Self::Pitch(_) => {
                let frames = tracker.f0_candidates(buffer)?;
                let maxima = pitch::max_candidate_per_frame(&frames);
                if maxima.is_empty() {
                    return Err(FeatureError::insufficient("no voiced frames"));
                }
                Ok(Feature::Vector(VectorFeature::from_vec(maxima)).into())
            }
            Self::VoiceQuality(config) => {
                let quality = measure_voice_quality(buffer, config, tracker)?;
                Ok(Feature::Vector(VectorFeature::from_vec(vec![
                    quality.jitter,
                    quality.shimmer,
                ]))
                .into())
            }
        }
    }
}

impl Display for FeatureConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let components = self.path_components();
        write!(f, "{}[{}]", components[0], components[1..].join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hfd_key_matches_directory_convention() {
        let config = FeatureConfig::Hfd(HfdConfig::new(5, true));
        assert_eq!(config.path_components(), vec!["hfd", "kmax=5", "norm=true"]);
        assert_eq!(config.to_string(), "hfd[kmax=5, norm=true]");
    }

    #[test]
    fn stft_key_uses_hop_length() {
        let config = FeatureConfig::StftSegmented(StftConfig::new(512, 0.25, false));
        assert_eq!(
            config.path_components(),
            vec!["stft_segmented", "window=512", "hop_length=128", "norm=false"]
        );
    }

    #[test]
    fn voice_quality_key_names_preemphasis() {
        let plain = FeatureConfig::VoiceQuality(VoiceQualityConfig::default());
        assert_eq!(
            plain.path_components(),
            vec!["voice_quality", "floor=75", "ceiling=500", "preemphasis=none"]
        );
        let emphasised =
            FeatureConfig::VoiceQuality(VoiceQualityConfig::default().with_preemphasis(50.0));
        assert_eq!(emphasised.path_components()[3], "preemphasis=50");
        assert_eq!(plain.rate_policy(22_050), RatePolicy::Native);
    }

    #[test]
    fn debug_plot_does_not_change_dfa_key() {
        let plain = FeatureConfig::Dfa(DfaConfig::dfa2());
        let plotted =
            FeatureConfig::Dfa(DfaConfig::dfa2().with_debug_plot(DebugPlot::TempFile));
        assert_eq!(plain.path_components(), plotted.path_components());
    }

    #[test]
    fn rate_policy_keeps_native_rate_for_hfd() {
        assert_eq!(
            FeatureConfig::Hfd(HfdConfig::new(5, false)).rate_policy(22_050),
            RatePolicy::Native
        );
        assert_eq!(
            FeatureConfig::Tempo(TempoConfig::default()).rate_policy(22_050),
            RatePolicy::Fixed(22_050)
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = FeatureConfig::Dfa(DfaConfig::dfa2().with_window_sizes(vec![8, 16, 32]));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""feature":"dfa""#));
        let back: FeatureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
