//! Stage configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use stagepipe_shared::constants::pool::MAX_WORKERS;
use stagepipe_shared::errors::{StageError, StageResult};

/// Execution mode for lazy inputs, fixed when the stage is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Apply the transform on the consumer's thread, one item per pull.
    Sequential,
    /// Apply the transform on a per-run pool of `workers` threads.
    Parallel { workers: usize },
}

impl ExecutionMode {
    pub fn workers(&self) -> usize {
        match self {
            Self::Sequential => 0,
            Self::Parallel { workers } => *workers,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel { .. })
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel { workers } => write!(f, "parallel({})", workers),
        }
    }
}

/// Options recognized when building a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Pool size for lazy inputs. `0` runs them serially.
    pub workers: usize,
    /// Trace execution mode and executor identity at `info` level.
    pub verbose: bool,
}

impl StageOptions {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validate the options.
    pub fn sanitize(&self) -> StageResult<()> {
        if self.workers > MAX_WORKERS {
            return Err(StageError::Config(format!(
                "workers must be at most {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        Ok(())
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.workers {
            0 => ExecutionMode::Sequential,
            workers => ExecutionMode::Parallel { workers },
        }
    }
}

/// A stage described by data: the registered transform name plus options.
///
/// ```json
/// { "transform": "square", "workers": 4, "verbose": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub transform: String,
    #[serde(flatten)]
    pub options: StageOptions,
}

impl StageConfig {
    pub fn new(transform: impl Into<String>, options: StageOptions) -> Self {
        Self {
            transform: transform.into(),
            options,
        }
    }

    pub fn from_json(json: &str) -> StageResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| StageError::Config(format!("invalid stage config: {}", e)))
    }

    /// Parse a list of stage configs, e.g. a whole pipeline.
    pub fn list_from_json(json: &str) -> StageResult<Vec<Self>> {
        serde_json::from_str(json)
            .map_err(|e| StageError::Config(format!("invalid pipeline config: {}", e)))
    }
}
