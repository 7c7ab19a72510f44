mod common;

use speech_features::features::{compute_dfa, DebugPlot, DfaConfig, ExponentFit};
use speech_features::FeatureError;

use common::{random_walk, uniform_noise};

const LEN: usize = 20_000;

fn scales() -> Vec<usize> {
    vec![16, 22, 32, 45, 64, 90, 128, 181, 256, 362, 512, 724, 1024, 1448, 2000]
}

#[test]
fn white_noise_exponent_is_one_half() {
    let samples = uniform_noise(LEN, 21);
    let config = DfaConfig::reference_default().with_window_sizes(scales());
    let outcome = compute_dfa(&samples, &config).unwrap();
    assert!(
        (outcome.exponent - 0.5).abs() < 0.15,
        "white noise exponent was {}",
        outcome.exponent
    );
    assert_eq!(outcome.fluctuations.len(), scales().len());
}

#[test]
fn random_walk_exponent_is_three_halves() {
    let samples = random_walk(LEN, 22);
    for fit in [ExponentFit::Robust, ExponentFit::LeastSquares] {
        let config = DfaConfig::reference_default()
            .with_window_sizes(scales())
            .with_exponent_fit(fit);
        let outcome = compute_dfa(&samples, &config).unwrap();
        assert!(
            (outcome.exponent - 1.5).abs() < 0.15,
            "random walk exponent was {} with {:?}",
            outcome.exponent,
            fit
        );
    }
}

#[test]
fn default_scales_give_a_sensible_exponent() {
    let samples = uniform_noise(LEN, 23);
    let outcome = compute_dfa(&samples, &DfaConfig::dfa2()).unwrap();
    assert!(
        (0.3..0.8).contains(&outcome.exponent),
        "DFA2 exponent was {}",
        outcome.exponent
    );
    assert_eq!(outcome.fluctuations[0].0, 8);
}

#[test]
fn window_at_or_above_length_is_invalid() {
    let samples = uniform_noise(1_000, 24);
    let config = DfaConfig::reference_default().with_window_sizes(vec![16, 32, 1_000]);
    assert!(matches!(
        compute_dfa(&samples, &config),
        Err(FeatureError::InvalidParameter(_))
    ));
}

#[test]
fn debug_plot_path_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("plots").join("dfa.svg");
    let samples = uniform_noise(4_000, 25);
    let config = DfaConfig::reference_default()
        .with_window_sizes(vec![16, 32, 64, 128, 256])
        .with_debug_plot(DebugPlot::Path(target.clone()));
    let outcome = compute_dfa(&samples, &config).unwrap();
    assert_eq!(outcome.debug_plot.as_deref(), Some(target.as_path()));
    let svg = std::fs::read_to_string(&target).unwrap();
    assert!(svg.starts_with("<svg") || svg.starts_with("<?xml"));
}

#[test]
fn temp_plot_is_kept() {
    let samples = uniform_noise(4_000, 26);
    let config = DfaConfig::reference_default()
        .with_window_sizes(vec![16, 32, 64, 128])
        .with_debug_plot(DebugPlot::TempFile);
    let outcome = compute_dfa(&samples, &config).unwrap();
    let path = outcome.debug_plot.expect("temp plot path");
    assert!(path.is_file());
    std::fs::remove_file(path).unwrap();
}
