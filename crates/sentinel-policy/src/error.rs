//! Policy error types.

use std::path::PathBuf;

use thiserror::Error;

/// Error raised while loading or validating a policy document.
///
/// Evaluation itself never fails; these errors only occur when a document
/// is read, parsed, or validated.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse policy: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid policy: {0}")]
    Invalid(String),

    #[error("invalid time window: {0}")]
    InvalidTimeWindow(String),

    #[error("unknown reason code: {0}")]
    UnknownReasonCode(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
