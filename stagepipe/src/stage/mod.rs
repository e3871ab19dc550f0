//! Stage definition and call-time dispatch.
//!
//! A [`Stage`] wraps a [`Transform`] together with its worker count and
//! verbose flag. Calling it dispatches on the argument:
//!
//! ```text
//! StageInput::Item(x)      → StageOutput::Direct(transform(x))     (caller thread)
//! StageInput::Sequence(xs) → StageOutput::Lazy(StageIter)          (nothing pulled yet)
//!                              workers == 0 → serial run
//!                              workers  > 0 → parallel run
//! ```
//!
//! Stages compose: a [`StageIter`] converts into the next stage's
//! [`StageInput`], and errors keep their position as they flow downstream.

mod options;
mod registry;

use std::fmt;
use std::sync::Arc;

use stagepipe_shared::errors::{StageError, StageResult};

use crate::executor::{BoxedInput, ParallelRun, SerialRun, StageIter, Task};
use crate::pool::{PoolFactory, RayonPoolFactory};
use crate::transform::{TaskContext, Transform};

pub use options::{ExecutionMode, StageConfig, StageOptions};
pub use registry::{DynTransform, TransformRegistry};

/// Argument of a stage call.
pub enum StageInput<I> {
    /// A single item, transformed immediately.
    Item(I),
    /// A lazy sequence, transformed as the result is pulled.
    Sequence(BoxedInput<I>),
}

impl<I: Send + 'static> StageInput<I> {
    pub fn item(item: I) -> Self {
        Self::Item(item)
    }

    pub fn sequence<S>(items: S) -> Self
    where
        S: IntoIterator<Item = I>,
        S::IntoIter: Send + 'static,
    {
        Self::Sequence(Box::new(items.into_iter().map(Ok::<I, StageError>)))
    }

    /// A sequence whose elements may already be failures, e.g. the output of
    /// an upstream stage.
    pub fn fallible<S>(items: S) -> Self
    where
        S: IntoIterator<Item = StageResult<I>>,
        S::IntoIter: Send + 'static,
    {
        Self::Sequence(Box::new(items.into_iter()))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }
}

impl<I: Send + 'static> From<StageIter<I>> for StageInput<I> {
    fn from(upstream: StageIter<I>) -> Self {
        Self::fallible(upstream)
    }
}

impl<I: fmt::Debug> fmt::Debug for StageInput<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(item) => f.debug_tuple("Item").field(item).finish(),
            Self::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}

/// Result of a stage call, tagged by execution path.
#[derive(Debug)]
pub enum StageOutput<O> {
    Direct(StageResult<O>),
    Lazy(StageIter<O>),
}

impl<O> StageOutput<O> {
    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    pub fn into_direct(self) -> Option<StageResult<O>> {
        match self {
            Self::Direct(result) => Some(result),
            Self::Lazy(_) => None,
        }
    }

    pub fn into_lazy(self) -> Option<StageIter<O>> {
        match self {
            Self::Lazy(iter) => Some(iter),
            Self::Direct(_) => None,
        }
    }
}

/// A transformation configured as a pipeline stage.
///
/// Immutable once built. Cloning is cheap and shares the transform.
pub struct Stage<T: Transform> {
    transform: Arc<T>,
    name: Arc<str>,
    options: StageOptions,
    mode: ExecutionMode,
    pool_factory: Arc<dyn PoolFactory>,
}

impl<T: Transform> Stage<T> {
    pub fn builder(transform: T) -> StageBuilder<T> {
        StageBuilder::new(transform)
    }

    /// Shorthand for `Stage::builder(transform).options(options).build()`.
    pub fn new(transform: T, options: StageOptions) -> StageResult<Self> {
        Self::builder(transform).options(options).build()
    }

    /// Name of the wrapped transform.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured pool size (`0` for serial execution).
    pub fn workers(&self) -> usize {
        self.options.workers
    }

    pub fn verbose(&self) -> bool {
        self.options.verbose
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn options(&self) -> &StageOptions {
        &self.options
    }

    /// Dispatch on the argument; `options` reach every item of this call.
    pub fn call(&self, input: StageInput<T::Input>, options: T::Options) -> StageOutput<T::Output> {
        match input {
            StageInput::Item(item) => StageOutput::Direct(self.invoke(item, options)),
            StageInput::Sequence(items) => {
                StageOutput::Lazy(self.run_lazy(items, Arc::new(options)))
            }
        }
    }

    /// Transform a single item on the calling thread.
    pub fn invoke(&self, item: T::Input, options: T::Options) -> StageResult<T::Output> {
        let context = TaskContext::new(Arc::new(options), Arc::clone(&self.name), 0);
        Task::<T>::new(item, context).run(&self.transform, self.options.verbose)
    }

    /// Lazily transform `items`.
    pub fn map<S>(&self, items: S, options: T::Options) -> StageIter<T::Output>
    where
        S: IntoIterator<Item = T::Input>,
        S::IntoIter: Send + 'static,
    {
        let items = items.into_iter().map(Ok::<T::Input, StageError>);
        self.run_lazy(Box::new(items), Arc::new(options))
    }

    /// Lazily transform a sequence that may carry upstream failures. Each
    /// failure is yielded at its own position and ends the sequence.
    pub fn map_results<S>(&self, items: S, options: T::Options) -> StageIter<T::Output>
    where
        S: IntoIterator<Item = StageResult<T::Input>>,
        S::IntoIter: Send + 'static,
    {
        self.run_lazy(Box::new(items.into_iter()), Arc::new(options))
    }

    fn run_lazy(&self, items: BoxedInput<T::Input>, options: Arc<T::Options>) -> StageIter<T::Output> {
        let transform = Arc::clone(&self.transform);
        let stage = Arc::clone(&self.name);
        let verbose = self.options.verbose;

        match self.mode {
            ExecutionMode::Sequential => {
                StageIter::new(SerialRun::new(transform, items, options, stage, verbose))
            }
            ExecutionMode::Parallel { workers } => StageIter::new(ParallelRun::new(
                transform,
                items,
                options,
                stage,
                workers,
                verbose,
                Arc::clone(&self.pool_factory),
            )),
        }
    }
}

impl<T: Transform> Clone for Stage<T> {
    fn clone(&self) -> Self {
        Self {
            transform: Arc::clone(&self.transform),
            name: Arc::clone(&self.name),
            options: self.options.clone(),
            mode: self.mode,
            pool_factory: Arc::clone(&self.pool_factory),
        }
    }
}

impl<T: Transform> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("verbose", &self.options.verbose)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Stage`].
pub struct StageBuilder<T> {
    transform: T,
    options: StageOptions,
    pool_factory: Option<Arc<dyn PoolFactory>>,
}

impl<T: Transform> StageBuilder<T> {
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            options: StageOptions::default(),
            pool_factory: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.options.workers = workers;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    pub fn options(mut self, options: StageOptions) -> Self {
        self.options = options;
        self
    }

    /// Override how per-run pools are created. Defaults to [`RayonPoolFactory`].
    pub fn pool_factory(mut self, factory: Arc<dyn PoolFactory>) -> Self {
        self.pool_factory = Some(factory);
        self
    }

    pub fn build(self) -> StageResult<Stage<T>> {
        self.options.sanitize()?;

        let name: Arc<str> = Arc::from(self.transform.name());
        if name.is_empty() {
            return Err(StageError::Config(
                "stage transform must have a non-empty name".to_string(),
            ));
        }

        let pool_factory: Arc<dyn PoolFactory> = match self.pool_factory {
            Some(factory) => factory,
            None => Arc::new(RayonPoolFactory),
        };

        let mode = self.options.mode();
        tracing::debug!(stage = %name, mode = %mode, verbose = self.options.verbose, "Stage built");

        Ok(Stage {
            transform: Arc::new(self.transform),
            name,
            mode,
            options: self.options,
            pool_factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ExecutorId, from_fn};

    fn square(workers: usize) -> Stage<impl Transform<Input = i64, Output = i64, Options = ()>> {
        Stage::builder(from_fn("square", |x: i64, _: &TaskContext<()>| Ok(x * x)))
            .workers(workers)
            .build()
            .unwrap()
    }

    #[test]
    fn test_item_dispatches_directly() {
        let stage = square(2);

        let output = stage.call(StageInput::item(9), ());

        assert!(!output.is_lazy());
        assert_eq!(output.into_direct().unwrap().unwrap(), 81);
    }

    #[test]
    fn test_sequence_dispatches_lazily() {
        for workers in [0, 3] {
            let stage = square(workers);

            let output = stage.call(StageInput::sequence(vec![1, 2, 3]), ());

            assert!(output.is_lazy());
            let values: Vec<i64> = output
                .into_lazy()
                .unwrap()
                .collect::<StageResult<_>>()
                .unwrap();
            assert_eq!(values, vec![1, 4, 9]);
        }
    }

    #[test]
    fn test_mode_chosen_at_build_time() {
        assert_eq!(square(0).mode(), ExecutionMode::Sequential);
        assert_eq!(square(4).mode(), ExecutionMode::Parallel { workers: 4 });
        assert_eq!(square(4).workers(), 4);
        assert_eq!(square(4).name(), "square");
    }

    #[test]
    fn test_invoke_matches_single_element_run() {
        for workers in [0, 1, 2] {
            let stage = square(workers);
            let direct = stage.invoke(12, ()).unwrap();
            let lazy: Vec<i64> = stage.map(vec![12], ()).map(|r| r.unwrap()).collect();
            assert_eq!(lazy, vec![direct]);
        }
    }

    #[test]
    fn test_options_forwarded_to_every_item() {
        let stage = Stage::builder(from_fn("offset", |x: i64, ctx: &TaskContext<i64>| {
            Ok(x + ctx.options())
        }))
        .workers(2)
        .build()
        .unwrap();

        let output: Vec<i64> = stage.map(0..6, 100).map(|r| r.unwrap()).collect();
        assert_eq!(output, vec![100, 101, 102, 103, 104, 105]);
    }

    #[test]
    fn test_parallel_items_run_on_workers() {
        let stage = Stage::builder(from_fn("where", |_: u8, ctx: &TaskContext<()>| {
            Ok(ctx.executor())
        }))
        .workers(2)
        .verbose(true)
        .build()
        .unwrap();

        assert_eq!(stage.invoke(0, ()).unwrap(), ExecutorId::Caller);
        assert!(stage.map(0..4u8, ()).all(|r| r.unwrap().is_worker()));
    }

    #[test]
    fn test_stages_compose() {
        let square = square(2);
        let negate = Stage::builder(from_fn("negate", |x: i64, _: &TaskContext<()>| Ok(-x)))
            .workers(square.workers() + 1)
            .build()
            .unwrap();

        let squared = square.map(1..=4, ());
        let negated = negate.call(squared.into(), ()).into_lazy().unwrap();
        let output: Vec<i64> = negated.map(|r| r.unwrap()).collect();

        assert_eq!(output, vec![-1, -4, -9, -16]);
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let err = Stage::new(
            from_fn("square", |x: i64, _: &TaskContext<()>| Ok(x * x)),
            StageOptions::new(usize::MAX),
        )
        .unwrap_err();
        assert!(matches!(err, StageError::Config(_)));

        let err = Stage::new(
            from_fn("", |x: i64, _: &TaskContext<()>| Ok(x)),
            StageOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }

    #[test]
    fn test_clone_shares_configuration() {
        let stage = square(3);
        let cloned = stage.clone();
        assert_eq!(cloned.mode(), stage.mode());
        assert_eq!(cloned.invoke(3, ()).unwrap(), 9);
    }
}
