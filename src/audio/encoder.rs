use std::path::Path;

use crate::error::{FeatureError, Result};
use crate::types::SampleBuffer;

/// Write a mono buffer as a 16-bit PCM WAV file.
///
/// Only the test suites write audio; they use this to build fixture recordings.
pub fn encode_wav<P: AsRef<Path>>(buffer: &SampleBuffer, path: P) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let to_storage = |err: hound::Error| {
        let source = match err {
            hound::Error::IoError(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        };
        FeatureError::storage(path, source)
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_storage)?;
    for &sample in buffer.samples.iter() {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(scaled).map_err(to_storage)?;
    }
    writer.finalize().map_err(to_storage)?;
    Ok(())
}
