pub mod decoder;
pub mod encoder;
pub mod resample;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SampleBuffer;

pub use decoder::decode_audio;
pub use encoder::encode_wav;
pub use resample::resample_to;

/// Sample rate at which an estimator wants its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePolicy {
    /// Keep the file's own sample rate.
    Native,
    Fixed(u32),
}

/// Decode `path` and bring it to the rate demanded by `policy`.
pub fn load<P: AsRef<Path>>(path: P, policy: RatePolicy) -> Result<SampleBuffer> {
    let decoded = decode_audio(path)?;
    conform(&decoded, policy)
}

pub fn conform(buffer: &SampleBuffer, policy: RatePolicy) -> Result<SampleBuffer> {
    match policy {
        RatePolicy::Native => Ok(buffer.clone()),
        RatePolicy::Fixed(rate) => resample_to(buffer, rate),
    }
}
