//! Shared constants.

pub mod pool {
    /// Upper bound on workers a single stage may request.
    pub const MAX_WORKERS: usize = 512;

    /// Thread name prefix for pool workers (`stagepipe-worker-0`, ...).
    pub const WORKER_THREAD_PREFIX: &str = "stagepipe-worker";
}

pub mod logging {
    pub const DEFAULT_LEVEL: &str = "info";

    /// File name prefix for rolling log files.
    pub const LOG_FILE_PREFIX: &str = "stagepipe.log";
}
