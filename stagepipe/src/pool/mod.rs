//! Worker pools executing stage tasks.
//!
//! A parallel run asks its [`PoolFactory`] for a fresh pool on the first pull
//! and holds it through a [`PoolGuard`], which shuts it down on every exit
//! path of the run:
//! - input exhausted and all slots drained
//! - a task error drained
//! - the consumer closed or dropped the sequence early
//!
//! [`RayonPool`] is the default backend.

use crate::transform::ExecutorId;
use stagepipe_shared::errors::StageResult;

pub use guard::PoolGuard;
pub use handle::{Completion, PendingHandle};
pub use rayon_pool::{RayonPool, RayonPoolFactory};

mod guard;
mod handle;
mod rayon_pool;

/// Type-erased unit of work. The pool passes the identity of the executor
/// that runs it.
pub type Job = Box<dyn FnOnce(ExecutorId) + Send + 'static>;

/// Fixed-capacity set of concurrent executors.
pub trait WorkerPool: Send {
    /// Queue a job without blocking.
    fn submit(&self, job: Job) -> StageResult<()>;

    /// Number of workers.
    fn size(&self) -> usize;

    /// Stop accepting jobs and release the workers. Must be idempotent.
    fn shutdown(&mut self);
}

/// Creates one pool per parallel run.
pub trait PoolFactory: Send + Sync {
    fn create(&self, workers: usize) -> StageResult<Box<dyn WorkerPool>>;
}
