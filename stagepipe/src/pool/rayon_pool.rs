//! Worker pool backed by a dedicated rayon thread pool.

use super::{Job, PoolFactory, WorkerPool};
use crate::transform::ExecutorId;
use stagepipe_shared::constants::pool::{MAX_WORKERS, WORKER_THREAD_PREFIX};
use stagepipe_shared::errors::{StageError, StageResult};
use ulid::Ulid;

/// Fixed-size pool of OS threads owned by a single run.
///
/// Dropping the rayon pool lets queued jobs finish on the worker threads but
/// does not block the caller.
pub struct RayonPool {
    id: Ulid,
    size: usize,
    inner: Option<rayon::ThreadPool>,
}

impl RayonPool {
    pub fn new(workers: usize) -> StageResult<Self> {
        if workers == 0 || workers > MAX_WORKERS {
            return Err(StageError::Config(format!(
                "worker pool size must be between 1 and {}, got {}",
                MAX_WORKERS, workers
            )));
        }

        let id = Ulid::new();
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("{}-{}", WORKER_THREAD_PREFIX, index))
            .panic_handler(|_| tracing::error!("Worker job panicked outside the task boundary"))
            .build()
            .map_err(|e| StageError::Pool(format!("failed to build worker pool: {}", e)))?;

        tracing::trace!(pool_id = %id, workers, "Worker pool created");

        Ok(Self {
            id,
            size: workers,
            inner: Some(inner),
        })
    }

    pub fn id(&self) -> Ulid {
        self.id
    }
}

impl WorkerPool for RayonPool {
    fn submit(&self, job: Job) -> StageResult<()> {
        let pool = self
            .inner
            .as_ref()
            .ok_or_else(|| StageError::Pool(format!("pool {} is shut down", self.id)))?;

        let pool_id = self.id;
        pool.spawn(move || {
            let index = rayon::current_thread_index().unwrap_or_default();
            job(ExecutorId::Worker {
                pool: pool_id,
                index,
            });
        });
        Ok(())
    }

    fn size(&self) -> usize {
        self.size
    }

    fn shutdown(&mut self) {
        if self.inner.take().is_some() {
            tracing::trace!(pool_id = %self.id, "Worker pool shut down");
        }
    }
}

impl Drop for RayonPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Default [`PoolFactory`]: one [`RayonPool`] per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonPoolFactory;

impl PoolFactory for RayonPoolFactory {
    fn create(&self, workers: usize) -> StageResult<Box<dyn WorkerPool>> {
        Ok(Box::new(RayonPool::new(workers)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_submit_runs_job_on_worker() {
        let pool = RayonPool::new(2).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        for _ in 0..8 {
            let tx = tx.clone();
            pool.submit(Box::new(move |executor| {
                tx.send(executor).unwrap();
            }))
            .unwrap();
        }
        drop(tx);

        let executors: Vec<ExecutorId> = rx.iter().collect();
        assert_eq!(executors.len(), 8);

        let indexes: HashSet<usize> = executors
            .iter()
            .map(|executor| match executor {
                ExecutorId::Worker { pool: id, index } => {
                    assert_eq!(*id, pool.id());
                    *index
                }
                ExecutorId::Caller => panic!("job ran on the caller"),
            })
            .collect();
        assert!(indexes.iter().all(|index| *index < 2));
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(matches!(RayonPool::new(0), Err(StageError::Config(_))));
        assert!(matches!(
            RayonPool::new(MAX_WORKERS + 1),
            Err(StageError::Config(_))
        ));
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut pool = RayonPool::new(1).unwrap();
        pool.shutdown();
        pool.shutdown();

        let result = pool.submit(Box::new(|_| {}));
        assert!(matches!(result, Err(StageError::Pool(_))));
    }

    #[test]
    fn test_factory_creates_requested_size() {
        let pool = RayonPoolFactory.create(3).unwrap();
        assert_eq!(pool.size(), 3);
    }
}
