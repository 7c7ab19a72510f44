#![allow(dead_code)]

use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_RATE: u32 = 16_000;

pub fn sine_wave(frequency: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
    let total_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..total_samples)
        .map(|index| {
            let t = index as f32 / sample_rate as f32;
            (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

pub fn uniform_noise(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0_f32..1.0)).collect()
}

pub fn random_walk(len: usize, seed: u64) -> Vec<f32> {
    uniform_noise(len, seed)
        .into_iter()
        .scan(0.0_f32, |acc, step| {
            *acc += step;
            Some(*acc)
        })
        .collect()
}

/// Short clicks every `60 / bpm` seconds.
pub fn click_train(bpm: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
    let total = (sample_rate as f32 * duration_secs) as usize;
    let period = (60.0 / bpm * sample_rate as f32) as usize;
    let click_len = (sample_rate / 100) as usize;
    let mut samples = vec![0.0_f32; total];
    for start in (0..total).step_by(period) {
        for (offset, sample) in samples[start..].iter_mut().take(click_len).enumerate() {
            let decay = 1.0 - offset as f32 / click_len as f32;
            *sample = decay * if offset % 2 == 0 { 0.9 } else { -0.9 };
        }
    }
    samples
}
