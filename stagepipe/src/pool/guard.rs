//! Scoped ownership of a worker pool.

use super::{Job, WorkerPool};
use stagepipe_shared::errors::{StageError, StageResult};

/// RAII guard for a run's worker pool.
///
/// Shuts the pool down when released or dropped, whichever comes first.
pub struct PoolGuard {
    pool: Option<Box<dyn WorkerPool>>,
    submitted: usize,
}

impl PoolGuard {
    pub fn new(pool: Box<dyn WorkerPool>) -> Self {
        Self {
            pool: Some(pool),
            submitted: 0,
        }
    }

    pub fn submit(&mut self, job: Job) -> StageResult<()> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| StageError::Pool("pool was already released".to_string()))?;
        pool.submit(job)?;
        self.submitted += 1;
        Ok(())
    }

    /// Jobs accepted by the pool so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn size(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.size())
    }

    pub fn is_released(&self) -> bool {
        self.pool.is_none()
    }

    /// Shut the pool down. Later calls are no-ops.
    pub fn release(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
            tracing::trace!(submitted = self.submitted, "Worker pool released");
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::ExecutorId;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runs jobs inline and counts shutdowns.
    struct InlinePool {
        shutdowns: Arc<AtomicUsize>,
    }

    impl WorkerPool for InlinePool {
        fn submit(&self, job: Job) -> StageResult<()> {
            job(ExecutorId::Caller);
            Ok(())
        }

        fn size(&self) -> usize {
            1
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn guard() -> (PoolGuard, Arc<AtomicUsize>) {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let pool = InlinePool {
            shutdowns: Arc::clone(&shutdowns),
        };
        (PoolGuard::new(Box::new(pool)), shutdowns)
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut guard, shutdowns) = guard();

        guard.release();
        guard.release();
        drop(guard);

        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_shuts_pool_down() {
        let (guard, shutdowns) = guard();
        assert_eq!(guard.size(), 1);

        drop(guard);

        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_submit_after_release_fails() {
        let (mut guard, _) = guard();
        guard.submit(Box::new(|_| {})).unwrap();
        assert_eq!(guard.submitted(), 1);

        guard.release();
        assert!(guard.is_released());

        let err = guard.submit(Box::new(|_| {})).unwrap_err();
        assert!(err.to_string().contains("already released"));
        assert_eq!(guard.submitted(), 1);
    }
}
