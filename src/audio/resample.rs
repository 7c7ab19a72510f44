use crate::error::{FeatureError, Result};
use crate::types::SampleBuffer;

/// Linearly resample `buffer` to `target_rate`; a matching rate is returned as-is.
pub fn resample_to(buffer: &SampleBuffer, target_rate: u32) -> Result<SampleBuffer> {
    if buffer.sample_rate == 0 || target_rate == 0 {
        return Err(FeatureError::invalid(format!(
            "cannot resample {} Hz to {} Hz",
            buffer.sample_rate, target_rate
        )));
    }
    if buffer.is_empty() || buffer.sample_rate == target_rate {
        return Ok(SampleBuffer {
            samples: buffer.samples.clone(),
            sample_rate: target_rate,
        });
    }

    let samples = &buffer.samples;
    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let output_len = ((samples.len() as f64) * ratio).round().max(1.0) as usize;
    let last_index = samples.len() - 1;
    let output = (0..output_len)
        .map(|i| {
            let position = i as f64 / ratio;
            let left = (position.floor() as usize).min(last_index);
            let right = (left + 1).min(last_index);
            let t = (position - left as f64) as f32;
            samples[left] * (1.0 - t) + samples[right] * t
        })
        .collect();
    Ok(SampleBuffer::new(output, target_rate))
}
