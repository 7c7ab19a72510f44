//! Runs a [`SweepPlan`] over a set of recordings and persists every unit.
//!
//! A unit is one `(file, FeatureConfig)` pair. Units already present in the
//! store are skipped, so rerunning a sweep only fills in what is missing.
//! Failures are logged with the file and configuration and collected in the
//! [`SweepReport`]; they never stop the sweep.

pub mod plan;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::audio::{self, RatePolicy};
use crate::error::{FeatureError, Result};
use crate::features::{FeatureConfig, PitchTracker, PyinTracker};
use crate::store::FeatureStore;
use crate::types::SampleBuffer;

pub use plan::{DfaGrid, DfaPreset, HfdGrid, StftGrid, SweepPlan, DEFAULT_ANALYSIS_RATE};

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg", "m4a", "aac"];

/// A unit (or a whole file when `config` is `None`) that produced no feature.
#[derive(Debug, Clone)]
pub struct UnitFailure {
    pub file: PathBuf,
    pub config: Option<FeatureConfig>,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub computed: usize,
    pub skipped: usize,
    pub failures: Vec<UnitFailure>,
    /// Debug plots written along the way.
    pub artifacts: Vec<PathBuf>,
}

impl SweepReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn merge(mut self, other: SweepReport) -> SweepReport {
        self.computed += other.computed;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
        self.artifacts.extend(other.artifacts);
        self
    }

    fn record_failure(&mut self, file: &Path, config: Option<&FeatureConfig>, err: &FeatureError) {
        self.failures.push(UnitFailure {
            file: file.to_path_buf(),
            config: config.cloned(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

pub struct FeatureSweep<S: FeatureStore> {
    plan: SweepPlan,
    store: S,
    tracker: Option<Arc<dyn PitchTracker>>,
    jobs: usize,
}

impl<S: FeatureStore> FeatureSweep<S> {
    pub fn new(plan: SweepPlan, store: S) -> Self {
        Self {
            plan,
            store,
            tracker: None,
            jobs: 1,
        }
    }

    /// Use `tracker` for every pitch unit instead of a pYIN tracker built from the plan.
    pub fn with_tracker(mut self, tracker: Arc<dyn PitchTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process `files` in parallel; configurations of one file run in order.
    pub fn run(&self, files: &[PathBuf]) -> Result<SweepReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|err| FeatureError::ComputationError(format!("worker pool: {err}")))?;

        let report = pool.install(|| {
            files
                .par_iter()
                .map(|file| self.run_file(file))
                .reduce(SweepReport::default, SweepReport::merge)
        });
        info!(
            files = files.len(),
            computed = report.computed,
            skipped = report.skipped,
            failed = report.failed(),
            "sweep finished"
        );
        Ok(report)
    }

    pub fn run_file(&self, file: &Path) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            let err = FeatureError::UnreadableFile {
                path: file.to_path_buf(),
                reason: "file name is not valid UTF-8".to_string(),
            };
            warn!(file = %file.display(), error = %err, "skipping file");
            report.record_failure(file, None, &err);
            return report;
        };

        let mut inputs = FileInputs::new(file);
        for config in self.plan.configs() {
            let components = config.path_components();
            if self.store.exists(&components, stem) {
                debug!(file = %file.display(), config = %config, "cached, skipping");
                report.skipped += 1;
                continue;
            }

            let buffer = match inputs.get(config.rate_policy(self.plan.analysis_rate)) {
                Ok(buffer) => buffer,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "cannot load recording");
                    report.record_failure(file, None, &err);
                    return report;
                }
            };

            let tracker = self.tracker_for(&config);
            let outcome = config
                .compute(&buffer, tracker.as_ref())
                .and_then(|computed| {
                    self.store
                        .save(&computed.feature, &components, stem)
                        .map(|path| (path, computed.artifact))
                });
            match outcome {
                Ok((path, artifact)) => {
                    debug!(file = %file.display(), config = %config, path = %path.display(), "computed");
                    if let Some(plot) = artifact {
                        info!(config = %config, plot = %plot.display(), "wrote DFA debug plot");
                        report.artifacts.push(plot);
                    }
                    report.computed += 1;
                }
                Err(err) => {
                    warn!(
                        file = %file.display(),
                        config = %config,
                        kind = err.kind(),
                        error = %err,
                        "feature unit failed"
                    );
                    report.record_failure(file, Some(&config), &err);
                }
            }
        }
        report
    }

    fn tracker_for(&self, config: &FeatureConfig) -> Arc<dyn PitchTracker> {
        match (&self.tracker, config) {
            (Some(tracker), _) => Arc::clone(tracker),
            (None, FeatureConfig::Pitch(pitch)) => Arc::new(PyinTracker::new(*pitch)),
            (None, FeatureConfig::VoiceQuality(voice)) => {
                Arc::new(PyinTracker::new(voice.pitch_config()))
            }
            (None, _) => Arc::new(PyinTracker::default()),
        }
    }
}

/// Decoded recording plus the resampled copies requested so far.
struct FileInputs<'a> {
    path: &'a Path,
    native: Option<SampleBuffer>,
    conformed: HashMap<RatePolicy, SampleBuffer>,
}

impl<'a> FileInputs<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            native: None,
            conformed: HashMap::new(),
        }
    }

    fn get(&mut self, policy: RatePolicy) -> Result<SampleBuffer> {
        if let Some(buffer) = self.conformed.get(&policy) {
            return Ok(buffer.clone());
        }
        let native = match &self.native {
            Some(buffer) => buffer.clone(),
            None => {
                let decoded = audio::decode_audio(self.path)?;
                debug!(
                    file = %self.path.display(),
                    sample_rate = decoded.sample_rate,
                    seconds = decoded.duration_secs(),
                    "decoded"
                );
                self.native = Some(decoded.clone());
                decoded
            }
        };
        let buffer = audio::conform(&native, policy)?;
        self.conformed.insert(policy, buffer.clone());
        Ok(buffer)
    }
}

/// Audio files under `dir`, sorted for a stable processing order.
pub fn collect_audio_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    AUDIO_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::HfdConfig;
    use crate::store::DirectoryStore;

    fn hfd_only() -> SweepPlan {
        SweepPlan {
            hfd: HfdGrid {
                kmax: vec![4],
                normalize: vec![true],
            },
            ..SweepPlan::empty()
        }
    }

    #[test]
    fn unreadable_file_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let sweep = FeatureSweep::new(hfd_only(), DirectoryStore::new(dir.path()));
        let report = sweep.run_file(&dir.path().join("missing.wav"));
        assert_eq!(report.computed, 0);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].kind, "unreadable_file");
        assert!(report.failures[0].config.is_none());
    }

    #[test]
    fn cached_units_skip_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        let config = FeatureConfig::Hfd(HfdConfig::new(4, true));
        store
            .save(
                &crate::types::Feature::scalar(1.0),
                &config.path_components(),
                "ghost",
            )
            .unwrap();

        // the recording does not exist, so any decode attempt would fail
        let sweep = FeatureSweep::new(hfd_only(), store);
        let report = sweep.run_file(Path::new("/nonexistent/ghost.wav"));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn collects_audio_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.wav", "a.WAV", "nested/c.flac", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = collect_audio_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.WAV"),
                PathBuf::from("b.wav"),
                PathBuf::from("nested/c.flac")
            ]
        );
    }

    #[test]
    fn reports_merge() {
        let a = SweepReport {
            computed: 2,
            skipped: 1,
            ..SweepReport::default()
        };
        let b = SweepReport {
            computed: 1,
            skipped: 3,
            ..SweepReport::default()
        };
        let merged = a.merge(b);
        assert_eq!((merged.computed, merged.skipped), (3, 4));
    }
}
