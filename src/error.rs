//! Error types for leoseg
//!
//! Every fatal condition in the training engine surfaces as an [`Error`]
//! value; nothing is converted into a degraded-but-continuing state.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for leoseg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the training engine, the checkpoint store and the
/// configuration layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tensor shapes that do not line up.
    #[error("Shape mismatch in {op}: expected {expected:?}, got {actual:?}")]
    Shape {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A task that breaks the pairing or non-emptiness invariants.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Class split ratio does not cover the available classes.
    #[error("Class split ratio {ratio:?} sums to {total}, but {available} classes are available")]
    ClassSplit {
        ratio: [usize; 3],
        total: usize,
        available: usize,
    },

    /// Experiment directory does not exist.
    #[error("Checkpoint directory not found: {0}\n  → Check experiment.number and data_path")]
    CheckpointDirMissing(PathBuf),

    /// No checkpoint for the requested episode.
    #[error("Checkpoint not found: {0}\n  → Supply an existing episode number or -1 for the latest")]
    CheckpointNotFound(PathBuf),

    /// The operator declined to overwrite an existing checkpoint.
    #[error("Refused to overwrite checkpoint for episode {episode}\n  → Supply the correct episode number to start experiment")]
    OverwriteRefused { episode: u64 },

    /// The operator kept answering with unrecognized input.
    #[error("No valid answer after {attempts} attempts to overwrite checkpoint for episode {episode}\n  → Supply the correct answer to the question")]
    ConfirmationExhausted { episode: u64, attempts: usize },

    /// Requested behaviour the engine does not implement.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Shorthand for a shape mismatch.
    pub fn shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::Shape {
            op,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Whether the error came from operator input rather than the program.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ClassSplit { .. }
                | Self::CheckpointDirMissing(_)
                | Self::CheckpointNotFound(_)
                | Self::OverwriteRefused { .. }
                | Self::ConfirmationExhausted { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON: {e}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(format!("YAML: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_message() {
        let err = Error::shape("concat_channels", &[1, 8, 4, 4], &[1, 8, 2, 2]);
        let msg = err.to_string();
        assert!(msg.contains("concat_channels"));
        assert!(msg.contains("[1, 8, 2, 2]"));
    }

    #[test]
    fn test_user_errors() {
        assert!(Error::OverwriteRefused { episode: 3 }.is_user_error());
        assert!(Error::CheckpointNotFound(PathBuf::from("x")).is_user_error());
        assert!(!Error::Unsupported("x".into()).is_user_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
