mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use speech_features::audio::encode_wav;
use speech_features::features::{PitchFrame, PitchTracker, VoiceQualityConfig};
use speech_features::sweep::{collect_audio_files, DfaGrid, DfaPreset, HfdGrid, StftGrid};
use speech_features::{DirectoryStore, FeatureStore, FeatureSweep, SampleBuffer, SweepPlan};

use common::{sine_wave, uniform_noise, SAMPLE_RATE};

fn small_plan() -> SweepPlan {
    SweepPlan {
        hfd: HfdGrid {
            kmax: vec![5],
            normalize: vec![true],
        },
        dfa: DfaGrid {
            presets: vec![DfaPreset::ReferenceDefault],
            window_sizes: Some(vec![16, 32, 64, 128, 256]),
            ..DfaGrid::default()
        },
        stft: StftGrid {
            window_lengths: vec![320],
            hop_scales: vec![0.5],
            normalize: vec![true],
            ..StftGrid::default()
        },
        ..SweepPlan::empty()
    }
}

fn write_recordings(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    encode_wav(
        &SampleBuffer::new(sine_wave(220.0, 1.0, SAMPLE_RATE), SAMPLE_RATE),
        dir.join("P001.wav"),
    )?;
    let noise: Vec<f32> = uniform_noise(SAMPLE_RATE as usize, 5)
        .into_iter()
        .map(|x| 0.5 * x)
        .collect();
    encode_wav(&SampleBuffer::new(noise, SAMPLE_RATE), dir.join("P002.wav"))?;
    Ok(())
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
        .collect()
}

#[test]
fn second_run_skips_everything_and_changes_nothing() -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let audio_dir = workspace.path().join("audio");
    let store_root = workspace.path().join("store");
    write_recordings(&audio_dir)?;
    let files = collect_audio_files(&audio_dir);
    assert_eq!(files.len(), 2);

    let units = small_plan().configs().count();
    assert_eq!(units, 3);

    let sweep = FeatureSweep::new(small_plan(), DirectoryStore::new(&store_root)).with_jobs(2);
    let first = sweep.run(&files)?;
    assert_eq!(first.failed(), 0, "failures: {:?}", first.failures);
    assert_eq!(first.computed, 2 * units);
    assert_eq!(first.skipped, 0);
    let before = snapshot(&store_root);
    assert_eq!(before.len(), 2 * units);

    let again = FeatureSweep::new(small_plan(), DirectoryStore::new(&store_root));
    let second = again.run(&files)?;
    assert_eq!(second.computed, 0);
    assert_eq!(second.skipped, 2 * units);
    assert_eq!(snapshot(&store_root), before);
    Ok(())
}

#[test]
fn stored_layout_follows_config_components() -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let audio_dir = workspace.path().join("audio");
    write_recordings(&audio_dir)?;
    let store = DirectoryStore::new(workspace.path().join("store"));
    let sweep = FeatureSweep::new(small_plan(), store.clone());
    sweep.run(&collect_audio_files(&audio_dir))?;

    let hfd: Vec<String> = ["hfd", "kmax=5", "norm=true"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert!(store.exists(&hfd, "P001"));
    assert!(store
        .root()
        .join("stft_segmented/window=320/hop_length=160/norm=true/P002.json")
        .is_file());

    let sine = store.load(&hfd, "P001")?.flatten()[0];
    let noise = store.load(&hfd, "P002")?.flatten()[0];
    assert!(sine < noise, "sine {sine} should be smoother than noise {noise}");
    Ok(())
}

#[test]
fn failing_units_do_not_stop_the_sweep() -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let audio_dir = workspace.path().join("audio");
    write_recordings(&audio_dir)?;
    // a window longer than the clip fails every DFA unit
    let plan = SweepPlan {
        dfa: DfaGrid {
            presets: vec![DfaPreset::Dfa2],
            window_sizes: Some(vec![16, 1_000_000]),
            ..DfaGrid::default()
        },
        ..small_plan()
    };
    let sweep = FeatureSweep::new(plan, DirectoryStore::new(workspace.path().join("store")));
    let report = sweep.run(&collect_audio_files(&audio_dir))?;
    assert_eq!(report.failed(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.kind == "invalid_parameter" && f.config.is_some()));
    assert_eq!(report.computed, 4);
    Ok(())
}

#[test]
fn hop_longer_than_window_fails_the_unit_without_panicking() -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let audio_dir = workspace.path().join("audio");
    write_recordings(&audio_dir)?;
    let plan = SweepPlan {
        stft: StftGrid {
            window_lengths: vec![320],
            hop_scales: vec![2.0],
            normalize: vec![false],
            ..StftGrid::default()
        },
        ..SweepPlan::empty()
    };
    let sweep = FeatureSweep::new(plan, DirectoryStore::new(workspace.path().join("store")));
    let report = sweep.run(&collect_audio_files(&audio_dir))?;
    assert_eq!(report.computed, 0);
    assert_eq!(report.failed(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.kind == "invalid_parameter"));
    Ok(())
}

/// Reports a steady 220 Hz voice every 10 ms.
struct SteadyTracker;

impl PitchTracker for SteadyTracker {
    fn f0_candidates(&self, buffer: &SampleBuffer) -> speech_features::Result<Vec<PitchFrame>> {
        let frames = (buffer.duration_secs() / 0.01) as usize;
        Ok((1..frames)
            .map(|index| PitchFrame {
                index,
                time_secs: index as f64 * 0.01,
                candidates: vec![220.0],
            })
            .collect())
    }
}

#[test]
fn voice_quality_is_stored_as_jitter_and_shimmer() -> Result<()> {
    let workspace = tempfile::tempdir()?;
    let audio_dir = workspace.path().join("audio");
    write_recordings(&audio_dir)?;
    let plan = SweepPlan {
        voice_quality: vec![VoiceQualityConfig::default()],
        ..SweepPlan::empty()
    };
    let store = DirectoryStore::new(workspace.path().join("store"));
    let sweep = FeatureSweep::new(plan, store.clone()).with_tracker(Arc::new(SteadyTracker));
    let report = sweep.run(&collect_audio_files(&audio_dir))?;
    assert_eq!(report.failed(), 0, "failures: {:?}", report.failures);
    assert_eq!(report.computed, 2);

    let key: Vec<String> = ["voice_quality", "floor=75", "ceiling=500", "preemphasis=none"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let sine = store.load(&key, "P001")?.flatten();
    let noise = store.load(&key, "P002")?.flatten();
    assert_eq!(sine.len(), 2);
    assert_eq!(sine[0], 0.0, "a constant F0 has no jitter");
    assert!(sine[1] < noise[1], "sine shimmer {} vs noise {}", sine[1], noise[1]);
    Ok(())
}
