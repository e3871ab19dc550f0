//! Per-item tasks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use stagepipe_shared::errors::{StageError, StageResult};

use super::metrics::ActivityTracker;
use crate::pool::{Job, PendingHandle};
use crate::transform::{TaskContext, Transform};

/// One input item together with its execution context.
pub(crate) struct Task<T: Transform> {
    item: T::Input,
    context: TaskContext<T::Options>,
}

impl<T: Transform> Task<T> {
    pub(crate) fn new(item: T::Input, context: TaskContext<T::Options>) -> Self {
        Self { item, context }
    }

    /// Run on the calling thread. Panics propagate to the caller.
    pub(crate) fn run(self, transform: &T, verbose: bool) -> StageResult<T::Output> {
        trace_execution(&self.context, verbose);
        apply(transform, self.item, &self.context)
    }

    /// Package the task for a worker pool.
    ///
    /// Panics inside the transformation are caught on the worker and
    /// delivered through the handle like any other failure.
    pub(crate) fn into_job(
        self,
        transform: Arc<T>,
        tracker: Arc<ActivityTracker>,
        verbose: bool,
    ) -> (Job, PendingHandle<T::Output>) {
        let (completion, handle) = PendingHandle::channel();

        let job: Job = Box::new(move |executor| {
            let Task { item, context } = self;
            let context = context.on_executor(executor);

            let result = {
                let _active = tracker.enter();
                trace_execution(&context, verbose);
                apply_catching_panics(&*transform, item, &context)
            };

            if !completion.complete(result) {
                tracing::trace!(
                    stage = %context.stage(),
                    position = context.position(),
                    "Result discarded, run already closed"
                );
            }
        });

        (job, handle)
    }
}

fn trace_execution<O>(context: &TaskContext<O>, verbose: bool) {
    if verbose {
        tracing::info!(
            stage = %context.stage(),
            executor = %context.executor(),
            position = context.position(),
            "Executing wrapped transform"
        );
    }
}

fn apply<T: Transform>(
    transform: &T,
    item: T::Input,
    context: &TaskContext<T::Options>,
) -> StageResult<T::Output> {
    transform
        .apply(item, context)
        .map_err(|source| StageError::Task {
            stage: context.stage().to_string(),
            position: context.position(),
            source,
        })
}

fn apply_catching_panics<T: Transform>(
    transform: &T,
    item: T::Input,
    context: &TaskContext<T::Options>,
) -> StageResult<T::Output> {
    panic::catch_unwind(AssertUnwindSafe(|| apply(transform, item, context))).unwrap_or_else(
        |payload| {
            Err(StageError::Panicked {
                stage: context.stage().to_string(),
                position: context.position(),
                message: panic_message(payload.as_ref()),
            })
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
