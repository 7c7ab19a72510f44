//! Core types for the speech feature pipeline

use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Decoded mono audio (f32 samples, nominally in [-1.0, 1.0])
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub samples: Arc<[f32]>,
    /// Sample rate in Hz (e.g., 22050)
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::from(samples),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Multi-dimensional feature stored row-major with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorFeature {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl VectorFeature {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(FeatureError::invalid(format!(
                "shape {:?} holds {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn from_matrix(matrix: &Array2<f64>) -> Self {
        let (rows, cols) = matrix.dim();
        // `iter` walks logical order, so the data is row-major whatever the layout.
        Self {
            shape: vec![rows, cols],
            data: matrix.iter().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A computed feature value as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    Scalar { value: f64 },
    Vector(VectorFeature),
}

impl Feature {
    pub fn scalar(value: f64) -> Self {
        Self::Scalar { value }
    }

    /// Flattened values, the way the table compiler consumes them.
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            Self::Scalar { value } => vec![*value],
            Self::Vector(vector) => vector.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn matrix_flattens_row_major() {
        let matrix = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let feature = VectorFeature::from_matrix(&matrix);
        assert_eq!(feature.shape, vec![2, 3]);
        assert_eq!(feature.data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let transposed = VectorFeature::from_matrix(&matrix.t().to_owned());
        assert_eq!(transposed.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn rejects_mismatched_shape() {
        assert!(VectorFeature::new(vec![2, 2], vec![1.0; 3]).is_err());
    }

    #[test]
    fn scalar_serializes_with_tag() {
        let json = serde_json::to_string(&Feature::scalar(1.5)).unwrap();
        assert_eq!(json, r#"{"kind":"scalar","value":1.5}"#);
    }
}
