//! Lazy executors behind [`StageIter`].
//!
//! ```text
//! workers == 0  →  SerialRun    (caller thread, one item per pull)
//! workers  > 0  →  ParallelRun  (pool + sliding window of workers + 1 slots)
//! ```
//!
//! Both yield results in input order. The first error ends the sequence.

mod metrics;
mod parallel;
mod serial;
mod task;

use std::fmt;
use std::iter::FusedIterator;

use stagepipe_shared::errors::StageResult;

pub use metrics::RunMetrics;
pub(crate) use parallel::ParallelRun;
pub(crate) use serial::SerialRun;
pub(crate) use task::Task;

/// Boxed input sequence of a lazy run.
pub type BoxedInput<I> = Box<dyn Iterator<Item = StageResult<I>> + Send>;

/// A lazy run driven by pulls on [`StageIter`].
pub(crate) trait LazyRun<O>: Iterator<Item = StageResult<O>> + Send {
    /// Release every resource held by the run. Later pulls return `None`.
    fn close(&mut self);

    fn metrics(&self) -> RunMetrics;
}

/// Lazily computed output sequence of a stage.
///
/// Single pass: once it returns `None` (or after [`StageIter::close`]) it keeps
/// returning `None`. Dropping it releases the run's worker pool.
pub struct StageIter<O> {
    run: Box<dyn LazyRun<O>>,
}

impl<O> StageIter<O> {
    pub(crate) fn new(run: impl LazyRun<O> + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    /// Stop the run early and release its pool.
    pub fn close(&mut self) {
        self.run.close();
    }

    pub fn metrics(&self) -> RunMetrics {
        self.run.metrics()
    }
}

impl<O> Iterator for StageIter<O> {
    type Item = StageResult<O>;

    fn next(&mut self) -> Option<Self::Item> {
        self.run.next()
    }
}

impl<O> FusedIterator for StageIter<O> {}

impl<O> fmt::Debug for StageIter<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = self.metrics();
        f.debug_struct("StageIter")
            .field("stage", &metrics.stage)
            .field("run_id", &metrics.run_id)
            .field("mode", &metrics.mode)
            .finish_non_exhaustive()
    }
}
