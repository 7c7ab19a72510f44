//! Error taxonomy shared by the estimators, the store and the sweep.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for results returned by the feature engine.
pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Error, Debug)]
pub enum FeatureError {
    /// Caller-supplied configuration violates a precondition.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input is too short or degenerate for the requested configuration.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A fit could not be solved (singular or ill-conditioned design).
    #[error("numerical error: {0}")]
    NumericalError(String),

    #[error("computation failed: {0}")]
    ComputationError(String),

    #[error("unreadable file {path}: {reason}")]
    UnreadableFile { path: PathBuf, reason: String },

    #[error("external tool failed: {0}")]
    ExternalTool(String),

    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FeatureError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub(crate) fn insufficient(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub(crate) fn empty(message: impl Into<String>) -> Self {
        Self::EmptyInput(message.into())
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Short label used in sweep reports and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InsufficientData(_) => "insufficient_data",
            Self::EmptyInput(_) => "empty_input",
            Self::NumericalError(_) => "numerical_error",
            Self::ComputationError(_) => "computation_error",
            Self::UnreadableFile { .. } => "unreadable_file",
            Self::ExternalTool(_) => "external_tool",
            Self::Storage { .. } => "storage",
        }
    }
}
