//! Fixed-width windows over the frame axis of a spectrogram.

use ndarray::{s, Array2};

use crate::error::{FeatureError, Result};
use crate::features::stft::{normalize_columns, StftConfig};
use crate::types::VectorFeature;

/// A `bins x window_length` slice of a spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// First source frame covered by this segment.
    pub start: usize,
    /// Frames copied from the source; the rest are zero padding.
    pub valid_frames: usize,
    pub data: Array2<f64>,
}

impl Segment {
    pub fn is_padded(&self) -> bool {
        self.valid_frames < self.data.ncols()
    }

    /// Row-major flattening (frequency bin by frequency bin).
    pub fn flatten(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }
}

/// Split `matrix` into segments of `window_length` frames spaced by the hop.
///
/// Full segments start at `i * hop` for `i in 0..=(frames - window)/hop`.
/// When those leave trailing frames uncovered, one more segment starting at
/// the next hop position is emitted and zero-padded to `window_length`.
pub fn segment(matrix: &Array2<f64>, config: &StftConfig) -> Result<Vec<Segment>> {
    config.validate()?;
    let (bins, frames) = matrix.dim();
    if bins == 0 || frames == 0 {
        return Err(FeatureError::empty("spectrogram has no frames to segment"));
    }

    let window = config.window_length;
    let hop = config.hop_length();
    let full = if frames >= window {
        (frames - window) / hop + 1
    } else {
        0
    };

    let mut segments = Vec::with_capacity(full + 1);
    for i in 0..full {
        let start = i * hop;
        let mut data = matrix.slice(s![.., start..start + window]).to_owned();
        if config.normalize {
            normalize_columns(&mut data);
        }
        segments.push(Segment {
            start,
            valid_frames: window,
            data,
        });
    }

    let covered = if full == 0 {
        0
    } else {
        (full - 1) * hop + window
    };
    let start = full * hop;
    if covered < frames && start < frames {
        let valid_frames = frames - start;
        let mut data = Array2::zeros((bins, window));
        data.slice_mut(s![.., ..valid_frames])
            .assign(&matrix.slice(s![.., start..]));
        if config.normalize {
            normalize_columns(&mut data);
        }
        segments.push(Segment {
            start,
            valid_frames,
            data,
        });
    }

    Ok(segments)
}

/// Stack flattened segments into a `[segments, bins * window]` feature.
pub fn segments_to_feature(segments: &[Segment]) -> Result<VectorFeature> {
    let width = segments.first().map(|seg| seg.data.len()).unwrap_or(0);
    let mut data = Vec::with_capacity(width * segments.len());
    for seg in segments {
        if seg.data.len() != width {
            return Err(FeatureError::ComputationError(
                "segments differ in size".to_string(),
            ));
        }
        data.extend(seg.flatten());
    }
    VectorFeature::new(vec![segments.len(), width], data)
}
