use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use stagepipe_shared::errors::StageResult;
use ulid::Ulid;

use crate::stage::ExecutionMode;

/// Snapshot of one lazy run.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub stage: String,
    pub run_id: Ulid,
    pub mode: ExecutionMode,
    /// Items handed to the transformation (to the pool in parallel mode).
    pub submitted: usize,
    /// Results returned to the consumer, errors included.
    pub yielded: usize,
    pub failed: usize,
    /// Most tasks observed executing at the same time.
    pub peak_active: usize,
    pub duration_ms: u128,
}

impl RunMetrics {
    pub fn succeeded(&self) -> usize {
        self.yielded - self.failed
    }
}

/// Counts tasks currently executing and the high-water mark.
#[derive(Debug, Default)]
pub(crate) struct ActivityTracker {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActivityTracker {
    pub(crate) fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveGuard { tracker: self }
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub(crate) struct ActiveGuard<'a> {
    tracker: &'a ActivityTracker,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mutable bookkeeping behind [`RunMetrics`], owned by the run.
pub(crate) struct RunRecorder {
    stage: Arc<str>,
    run_id: Ulid,
    mode: ExecutionMode,
    verbose: bool,
    started: Instant,
    submitted: usize,
    yielded: usize,
    failed: usize,
    tracker: Arc<ActivityTracker>,
    finished_ms: Option<u128>,
}

impl RunRecorder {
    pub(crate) fn start(stage: Arc<str>, mode: ExecutionMode, verbose: bool) -> Self {
        let run_id = Ulid::new();

        if verbose {
            tracing::info!(stage = %stage, run_id = %run_id, mode = %mode, "Stage run started");
        } else {
            tracing::debug!(stage = %stage, run_id = %run_id, mode = %mode, "Stage run started");
        }

        Self {
            stage,
            run_id,
            mode,
            verbose,
            started: Instant::now(),
            submitted: 0,
            yielded: 0,
            failed: 0,
            tracker: Arc::new(ActivityTracker::default()),
            finished_ms: None,
        }
    }

    pub(crate) fn run_id(&self) -> Ulid {
        self.run_id
    }

    pub(crate) fn tracker(&self) -> &Arc<ActivityTracker> {
        &self.tracker
    }

    pub(crate) fn record_submitted(&mut self) {
        self.submitted += 1;
    }

    pub(crate) fn record_yield<T>(&mut self, result: &StageResult<T>) {
        self.yielded += 1;
        if result.is_err() {
            self.failed += 1;
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished_ms.is_some()
    }

    /// Freeze the duration and log the run summary. Only the first call logs.
    pub(crate) fn finish(&mut self, abandoned: usize) {
        if self.is_finished() {
            return;
        }
        self.finished_ms = Some(self.started.elapsed().as_millis());
        let metrics = self.snapshot();

        if abandoned > 0 {
            tracing::warn!(
                stage = %metrics.stage,
                run_id = %metrics.run_id,
                abandoned,
                "Stage run closed with outstanding tasks"
            );
        }

        if self.verbose {
            tracing::info!(
                stage = %metrics.stage,
                run_id = %metrics.run_id,
                submitted = metrics.submitted,
                yielded = metrics.yielded,
                failed = metrics.failed,
                peak_active = metrics.peak_active,
                duration_ms = metrics.duration_ms as u64,
                "Stage run finished"
            );
        } else {
            tracing::debug!(
                stage = %metrics.stage,
                run_id = %metrics.run_id,
                submitted = metrics.submitted,
                yielded = metrics.yielded,
                failed = metrics.failed,
                peak_active = metrics.peak_active,
                duration_ms = metrics.duration_ms as u64,
                "Stage run finished"
            );
        }
    }

    pub(crate) fn snapshot(&self) -> RunMetrics {
        RunMetrics {
            stage: self.stage.to_string(),
            run_id: self.run_id,
            mode: self.mode,
            submitted: self.submitted,
            yielded: self.yielded,
            failed: self.failed,
            peak_active: self.tracker.peak(),
            duration_ms: self
                .finished_ms
                .unwrap_or_else(|| self.started.elapsed().as_millis()),
        }
    }
}
