//! Pool-backed lazy execution with a sliding window.
//!
//! ## Scheduling
//!
//! ```text
//! capacity = workers + 1
//!
//! fill:   pull input → submit → store handle at `write` → advance `write`
//!         until `write` wraps onto `read` (window full)
//! full:   wait on handle at `read` → yield → advance `read`
//! drain:  input exhausted → wait/yield from `read` until no slot is left,
//!         then shut the pool down
//! ```
//!
//! Results leave the window in submission order, never completion order.
//! A failed slot ends the run at its own position; slots behind it are
//! abandoned and the pool is released immediately.

use std::sync::Arc;

use stagepipe_shared::errors::{StageError, StageResult};

use super::metrics::{RunMetrics, RunRecorder};
use super::{BoxedInput, LazyRun, Task};
use crate::pool::{PendingHandle, PoolFactory, PoolGuard};
use crate::stage::ExecutionMode;
use crate::transform::{TaskContext, Transform};
use crate::window::SlidingWindow;

pub(crate) struct ParallelRun<T: Transform> {
    transform: Arc<T>,
    /// `None` once the input is exhausted or the run is finished.
    input: Option<BoxedInput<T::Input>>,
    options: Arc<T::Options>,
    stage: Arc<str>,
    workers: usize,
    verbose: bool,
    factory: Arc<dyn PoolFactory>,
    /// Created on the first pull.
    pool: Option<PoolGuard>,
    window: SlidingWindow<PendingHandle<T::Output>>,
    position: usize,
    done: bool,
    recorder: RunRecorder,
}

impl<T: Transform> ParallelRun<T> {
    pub(crate) fn new(
        transform: Arc<T>,
        input: BoxedInput<T::Input>,
        options: Arc<T::Options>,
        stage: Arc<str>,
        workers: usize,
        verbose: bool,
        factory: Arc<dyn PoolFactory>,
    ) -> Self {
        let recorder = RunRecorder::start(
            Arc::clone(&stage),
            ExecutionMode::Parallel { workers },
            verbose,
        );
        Self {
            transform,
            input: Some(input),
            options,
            stage,
            workers,
            verbose,
            factory,
            pool: None,
            window: SlidingWindow::with_capacity(workers + 1),
            position: 0,
            done: false,
            recorder,
        }
    }

    fn ensure_pool(&mut self) -> StageResult<()> {
        if self.pool.is_none() {
            let pool = self.factory.create(self.workers)?;
            tracing::trace!(
                stage = %self.stage,
                run_id = %self.recorder.run_id(),
                workers = pool.size(),
                "Acquired worker pool"
            );
            self.pool = Some(PoolGuard::new(pool));
        }
        Ok(())
    }

    /// Submit one item and return the handle for its slot. Submission
    /// failures become an already-failed slot so they surface in order.
    fn submit(&mut self, item: T::Input) -> PendingHandle<T::Output> {
        let position = self.position;
        let context = TaskContext::new(
            Arc::clone(&self.options),
            Arc::clone(&self.stage),
            position,
        );
        let (job, handle) = Task::<T>::new(item, context).into_job(
            Arc::clone(&self.transform),
            Arc::clone(self.recorder.tracker()),
            self.verbose,
        );

        let submitted = match self.pool.as_mut() {
            Some(pool) => pool.submit(job),
            None => Err(StageError::Internal(
                "worker pool missing while submitting".to_string(),
            )),
        };

        match submitted {
            Ok(()) => {
                self.recorder.record_submitted();
                tracing::trace!(
                    stage = %self.stage,
                    position,
                    in_window = self.window.len() + 1,
                    "Submitted task"
                );
                handle
            }
            Err(e) => PendingHandle::ready(Err(e)),
        }
    }

    /// Block on the slot at the read cursor and yield it.
    fn drain_one(&mut self) -> StageResult<T::Output> {
        let result = match self.window.pop() {
            Some(handle) => handle.wait(),
            None => Err(StageError::Internal(
                "drained an empty sliding window".to_string(),
            )),
        };
        tracing::trace!(
            stage = %self.stage,
            ok = result.is_ok(),
            in_window = self.window.len(),
            "Drained slot"
        );

        self.recorder.record_yield(&result);
        if result.is_err() || (self.input.is_none() && self.window.is_empty()) {
            self.finish();
        }
        result
    }

    /// Release the pool and drop any outstanding slots. Idempotent.
    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.input = None;

        let abandoned = self.window.clear();
        if let Some(mut pool) = self.pool.take() {
            pool.release();
        }
        self.recorder.finish(abandoned);
    }
}

impl<T: Transform> Iterator for ParallelRun<T> {
    type Item = StageResult<T::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Err(e) = self.ensure_pool() {
            let result = Err(e);
            self.recorder.record_yield(&result);
            self.finish();
            return Some(result);
        }

        loop {
            if self.window.is_full() {
                return Some(self.drain_one());
            }

            let next = match self.input.as_mut() {
                Some(input) => input.next(),
                None => None,
            };

            let handle = match next {
                Some(Ok(item)) => self.submit(item),
                Some(Err(upstream)) => PendingHandle::ready(Err(upstream)),
                None => {
                    self.input = None;
                    if self.window.is_empty() {
                        self.finish();
                        return None;
                    }
                    return Some(self.drain_one());
                }
            };
            self.position += 1;

            if let Err(e) = self.window.push(handle) {
                self.finish();
                return Some(Err(e));
            }
        }
    }
}

impl<T: Transform> LazyRun<T::Output> for ParallelRun<T> {
    fn close(&mut self) {
        self.finish();
    }

    fn metrics(&self) -> RunMetrics {
        self.recorder.snapshot()
    }
}

impl<T: Transform> Drop for ParallelRun<T> {
    fn drop(&mut self) {
        self.finish();
    }
}
