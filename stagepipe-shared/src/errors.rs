//! Error types for stage construction and execution.

use thiserror::Error;

/// Result type used across stagepipe.
pub type StageResult<T> = Result<T, StageError>;

/// Errors raised while building or running a stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The stage could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transformation returned an error for the item at `position`.
    #[error("stage '{stage}' failed at position {position}: {source}")]
    Task {
        stage: String,
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The transformation panicked while running on a worker.
    #[error("stage '{stage}' panicked at position {position}: {message}")]
    Panicked {
        stage: String,
        position: usize,
        message: String,
    },

    /// The worker pool could not be created or lost a task.
    #[error("worker pool error: {0}")]
    Pool(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StageError {
    /// Input position of the failed item, for task failures.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Task { position, .. } | Self::Panicked { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Whether the error came from the transformation itself.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Self::Task { .. } | Self::Panicked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_task_error_display_and_source() {
        let err = StageError::Task {
            stage: "square".to_string(),
            position: 2,
            source: anyhow::anyhow!("boom"),
        };

        assert_eq!(err.to_string(), "stage 'square' failed at position 2: boom");
        assert_eq!(err.position(), Some(2));
        assert!(err.is_task_failure());
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }

    #[test]
    fn test_config_error_has_no_position() {
        let err = StageError::Config("transform 'nope' is not registered".into());

        assert!(err.to_string().contains("not registered"));
        assert_eq!(err.position(), None);
        assert!(!err.is_task_failure());
    }

    #[test]
    fn test_panicked_error_reports_position() {
        let err = StageError::Panicked {
            stage: "explode".to_string(),
            position: 7,
            message: "index out of bounds".to_string(),
        };

        assert_eq!(err.position(), Some(7));
        assert!(err.to_string().contains("panicked at position 7"));
    }
}
