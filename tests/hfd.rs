mod common;

use approx::assert_abs_diff_eq;
use speech_features::features::compute_hfd;
use speech_features::FeatureError;

use common::{sine_wave, uniform_noise, SAMPLE_RATE};

#[test]
fn sine_is_close_to_one() {
    let samples = sine_wave(200.0, 2.0, SAMPLE_RATE);
    let hfd = compute_hfd(&samples, 5, true).unwrap();
    assert!((0.9..=1.3).contains(&hfd), "sine HFD was {hfd}");
}

#[test]
fn uniform_noise_is_close_to_two() {
    let samples = uniform_noise(2 * SAMPLE_RATE as usize, 7);
    let hfd = compute_hfd(&samples, 5, true).unwrap();
    assert!((1.7..=2.1).contains(&hfd), "noise HFD was {hfd}");
}

#[test]
fn invariant_to_positive_affine_transforms() {
    let samples = uniform_noise(8_000, 11);
    let transformed: Vec<f32> = samples.iter().map(|&x| 3.5 * x + 0.25).collect();
    for normalize in [true, false] {
        let original = compute_hfd(&samples, 8, normalize).unwrap();
        let shifted = compute_hfd(&transformed, 8, normalize).unwrap();
        assert_abs_diff_eq!(original, shifted, epsilon = 1e-4);
    }
}

#[test]
fn kmax_at_or_above_length_is_invalid() {
    let samples = uniform_noise(64, 3);
    for kmax in [64, 65, 1_000] {
        assert!(matches!(
            compute_hfd(&samples, kmax, false),
            Err(FeatureError::InvalidParameter(_))
        ));
    }
}
