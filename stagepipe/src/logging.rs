//! Tracing subscriber setup for binaries and tests embedding stagepipe.
//!
//! The library itself only emits `tracing` events. Call [`init_logging`] once
//! at startup to route them to stderr or a daily-rolling file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stagepipe_shared::constants::logging::{DEFAULT_LEVEL, LOG_FILE_PREFIX};
use stagepipe_shared::errors::{StageError, StageResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or `"stagepipe=debug"`.
    pub level: String,
    /// Write to `<log_dir>/stagepipe.log.<date>` instead of stderr.
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

/// Install the global subscriber.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to
/// `options.level`. When logging to a file, keep the returned guard alive for
/// as long as events should be flushed.
pub fn init_logging(options: &LoggingOptions) -> StageResult<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .map_err(|e| StageError::Config(format!("invalid log level '{}': {}", options.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                StageError::Config(format!(
                    "failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;

            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|e| StageError::Internal(format!("failed to install subscriber: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_ansi(options.ansi)
                .try_init()
                .map_err(|e| StageError::Internal(format!("failed to install subscriber: {}", e)))?;
            Ok(None)
        }
    }
}
