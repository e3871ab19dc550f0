//! Order-preserving lazy pipeline stages.
//!
//! A [`Stage`] wraps a unary [`Transform`]. Calling it with a single item
//! applies the transformation right away; calling it with a sequence returns a
//! lazy [`StageIter`] that applies it on demand, either on the caller's thread
//! (`workers == 0`) or on a worker pool created for that run.
//!
//! Parallel runs keep at most `workers + 1` tasks in flight and always yield
//! results in input order.
//!
//! ```ignore
//! use stagepipe::{Stage, StageInput, TaskContext, from_fn};
//!
//! let square = Stage::builder(from_fn("square", |x: i64, _: &TaskContext<()>| Ok(x * x)))
//!     .workers(4)
//!     .build()?;
//!
//! let squares: Vec<i64> = square
//!     .map(1..=100, ())
//!     .collect::<Result<_, _>>()?;
//! ```

pub mod executor;
pub mod logging;
pub mod pool;
pub mod stage;
pub mod transform;

mod window;

pub use stagepipe_shared::errors::{StageError, StageResult};

pub use executor::{RunMetrics, StageIter};
pub use logging::{LoggingOptions, init_logging};
pub use pool::{
    Completion, Job, PendingHandle, PoolFactory, PoolGuard, RayonPool, RayonPoolFactory, WorkerPool,
};
pub use stage::{
    DynTransform, ExecutionMode, Stage, StageBuilder, StageConfig, StageInput, StageOptions,
    StageOutput, TransformRegistry,
};
pub use transform::{ExecutorId, FnTransform, TaskContext, Transform, from_fn};
