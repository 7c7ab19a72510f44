use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::features::{
    DebugPlot, DfaConfig, FeatureConfig, HfdConfig, MfccConfig, PitchConfig, StftConfig,
    TempoConfig, VoiceQualityConfig,
};

pub const DEFAULT_ANALYSIS_RATE: u32 = 22_050;

/// Named DFA parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DfaPreset {
    /// First-order detrending with overlap and a robust fit.
    ReferenceDefault,
    /// Second-order detrending.
    Dfa2,
}

impl DfaPreset {
    pub fn config(self) -> DfaConfig {
        match self {
            Self::ReferenceDefault => DfaConfig::reference_default(),
            Self::Dfa2 => DfaConfig::dfa2(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HfdGrid {
    pub kmax: Vec<usize>,
    pub normalize: Vec<bool>,
}

impl Default for HfdGrid {
    fn default() -> Self {
        Self {
            kmax: vec![5, 10, 20],
            normalize: vec![true, false],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DfaGrid {
    pub presets: Vec<DfaPreset>,
    /// Overrides the derived scales for every preset.
    pub window_sizes: Option<Vec<usize>>,
    /// Keep a log-log SVG per unit in the temp directory.
    pub debug_plot: bool,
    pub robust_deadline_ms: Option<u64>,
}

impl Default for DfaGrid {
    fn default() -> Self {
        Self {
            presets: vec![DfaPreset::ReferenceDefault, DfaPreset::Dfa2],
            window_sizes: None,
            debug_plot: false,
            robust_deadline_ms: None,
        }
    }
}

impl DfaGrid {
    pub fn config_for(&self, preset: DfaPreset) -> DfaConfig {
        let mut config = preset.config();
        if let Some(sizes) = &self.window_sizes {
            config = config.with_window_sizes(sizes.clone());
        }
        if self.debug_plot {
            config = config.with_debug_plot(DebugPlot::TempFile);
        }
        if let Some(ms) = self.robust_deadline_ms {
            config = config.with_robust_deadline(Duration::from_millis(ms));
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StftGrid {
    pub window_lengths: Vec<usize>,
    pub hop_scales: Vec<f64>,
    pub normalize: Vec<bool>,
    /// Store the whole magnitude matrix per file.
    pub full: bool,
    /// Store the stacked fixed-width segments per file.
    pub segmented: bool,
}

impl Default for StftGrid {
    fn default() -> Self {
        Self {
            window_lengths: vec![320, 512, 1024],
            hop_scales: vec![0.5, 0.25],
            normalize: vec![true, false],
            full: false,
            segmented: true,
        }
    }
}

/// Every configuration a sweep should compute for each file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepPlan {
    /// Rate that resampled estimators (DFA, STFT, MFCC, tempo) run at.
    pub analysis_rate: u32,
    pub hfd: HfdGrid,
    pub dfa: DfaGrid,
    pub stft: StftGrid,
    pub mfcc: Vec<MfccConfig>,
    pub tempo: Option<TempoConfig>,
    pub pitch: Option<PitchConfig>,
    /// Jitter and shimmer, with and without pre-emphasis.
    pub voice_quality: Vec<VoiceQualityConfig>,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            analysis_rate: DEFAULT_ANALYSIS_RATE,
            hfd: HfdGrid::default(),
            dfa: DfaGrid::default(),
            stft: StftGrid::default(),
            mfcc: vec![MfccConfig::new(13), MfccConfig::new(13).with_deltas(true)],
            tempo: Some(TempoConfig::default()),
            pitch: Some(PitchConfig::default()),
            voice_quality: vec![
                VoiceQualityConfig::default(),
                VoiceQualityConfig::default().with_preemphasis(50.0),
            ],
        }
    }
}

impl SweepPlan {
    /// A plan that computes nothing; fill in the grids you need.
    pub fn empty() -> Self {
        Self {
            analysis_rate: DEFAULT_ANALYSIS_RATE,
            hfd: HfdGrid {
                kmax: Vec::new(),
                normalize: Vec::new(),
            },
            dfa: DfaGrid {
                presets: Vec::new(),
                ..DfaGrid::default()
            },
            stft: StftGrid {
                window_lengths: Vec::new(),
                ..StftGrid::default()
            },
            mfcc: Vec::new(),
            tempo: None,
            pitch: None,
            voice_quality: Vec::new(),
        }
    }

    /// Lazily enumerate the configurations of this plan.
    ///
    /// Each call starts a fresh pass, so the sequence can be walked once per file.
    pub fn configs(&self) -> impl Iterator<Item = FeatureConfig> + '_ {
        let hfd = self.hfd.kmax.iter().flat_map(move |&kmax| {
            self.hfd
                .normalize
                .iter()
                .map(move |&normalize| FeatureConfig::Hfd(HfdConfig::new(kmax, normalize)))
        });

        let dfa = self
            .dfa
            .presets
            .iter()
            .map(move |&preset| FeatureConfig::Dfa(self.dfa.config_for(preset)));

        let stft = self.stft.window_lengths.iter().flat_map(move |&window| {
            self.stft.hop_scales.iter().flat_map(move |&hop_scale| {
                self.stft.normalize.iter().flat_map(move |&normalize| {
                    let config = StftConfig::new(window, hop_scale, normalize);
                    let full = self.stft.full.then(|| FeatureConfig::Stft(config));
                    let segmented = self
                        .stft
                        .segmented
                        .then(|| FeatureConfig::StftSegmented(config));
                    full.into_iter().chain(segmented)
                })
            })
        });

        let mfcc = self.mfcc.iter().copied().map(FeatureConfig::Mfcc);
        let tempo = self.tempo.into_iter().map(FeatureConfig::Tempo);
        let pitch = self.pitch.into_iter().map(FeatureConfig::Pitch);
        let voice = self
            .voice_quality
            .iter()
            .copied()
            .map(FeatureConfig::VoiceQuality);

        hfd.chain(dfa)
            .chain(stft)
            .chain(mfcc)
            .chain(tempo)
            .chain(pitch)
            .chain(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_enumerates_cartesian_product() {
        let plan = SweepPlan::default();
        let configs: Vec<_> = plan.configs().collect();
        let stft = configs
            .iter()
            .filter(|c| matches!(c, FeatureConfig::StftSegmented(_)))
            .count();
        let hfd = configs
            .iter()
            .filter(|c| matches!(c, FeatureConfig::Hfd(_)))
            .count();
        assert_eq!(stft, 3 * 2 * 2);
        assert_eq!(hfd, 3 * 2);
        assert_eq!(configs.len(), 6 + 2 + 12 + 2 + 1 + 1 + 2);
    }

    #[test]
    fn configs_restart_from_the_beginning() {
        let plan = SweepPlan::default();
        let first: Vec<_> = plan.configs().take(3).collect();
        let again: Vec<_> = plan.configs().take(3).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn empty_plan_yields_nothing() {
        assert_eq!(SweepPlan::empty().configs().count(), 0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let plan: SweepPlan = serde_json::from_str(r#"{"hfd": {"kmax": [8]}}"#).unwrap();
        assert_eq!(plan.hfd.kmax, vec![8]);
        assert_eq!(plan.hfd.normalize, vec![true, false]);
        assert_eq!(plan.analysis_rate, DEFAULT_ANALYSIS_RATE);
    }

    #[test]
    fn dfa_grid_overrides_apply_to_each_preset() {
        let grid = DfaGrid {
            window_sizes: Some(vec![16, 32, 64]),
            debug_plot: true,
            ..DfaGrid::default()
        };
        let config = grid.config_for(DfaPreset::Dfa2);
        assert_eq!(config.detrend_order, 2);
        assert_eq!(config.window_sizes, Some(vec![16, 32, 64]));
        assert_eq!(config.debug_plot, DebugPlot::TempFile);
    }
}
