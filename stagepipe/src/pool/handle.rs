//! Pending task results.

use crossbeam_channel::{Receiver, Sender};
use stagepipe_shared::errors::{StageError, StageResult};

/// Result of one submitted task, waited on when its window slot is drained.
pub struct PendingHandle<T> {
    state: State<T>,
}

enum State<T> {
    Waiting(Receiver<StageResult<T>>),
    Ready(StageResult<T>),
}

/// Sending half of a [`PendingHandle`], owned by the job.
pub struct Completion<T> {
    tx: Sender<StageResult<T>>,
}

impl<T> PendingHandle<T> {
    /// Create a handle and the completion that fills it.
    pub fn channel() -> (Completion<T>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (
            Completion { tx },
            Self {
                state: State::Waiting(rx),
            },
        )
    }

    /// A handle whose result is already known.
    pub fn ready(result: StageResult<T>) -> Self {
        Self {
            state: State::Ready(result),
        }
    }

    /// Whether `wait` would return without blocking.
    pub fn is_ready(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Waiting(rx) => !rx.is_empty(),
        }
    }

    /// Block until the task finishes.
    pub fn wait(self) -> StageResult<T> {
        match self.state {
            State::Ready(result) => result,
            State::Waiting(rx) => rx.recv().unwrap_or_else(|_| {
                Err(StageError::Pool(
                    "task was dropped before producing a result".to_string(),
                ))
            }),
        }
    }
}

impl<T> Completion<T> {
    /// Deliver the result. Returns `false` if the handle was already dropped.
    pub fn complete(self, result: StageResult<T>) -> bool {
        self.tx.send(result).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ready_handle_returns_immediately() {
        let handle = PendingHandle::ready(Ok(5));
        assert!(handle.is_ready());
        assert_eq!(handle.wait().unwrap(), 5);
    }

    #[test]
    fn test_wait_receives_result_from_other_thread() {
        let (completion, handle) = PendingHandle::channel();
        assert!(!handle.is_ready());

        let worker = thread::spawn(move || completion.complete(Ok("done")));

        assert_eq!(handle.wait().unwrap(), "done");
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_dropped_completion_reports_pool_error() {
        let (completion, handle) = PendingHandle::<i32>::channel();
        drop(completion);

        let err = handle.wait().unwrap_err();
        assert!(matches!(err, StageError::Pool(_)));
    }

    #[test]
    fn test_complete_after_handle_dropped() {
        let (completion, handle) = PendingHandle::channel();
        drop(handle);

        assert!(!completion.complete(Ok(1)));
    }
}
