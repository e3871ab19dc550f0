//! Transformation contract for pipeline stages.
//!
//! A [`Transform`] maps one input item to one output item. Everything besides
//! the item (per-run options, executing worker, input position) reaches the
//! transformation through [`TaskContext`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ulid::Ulid;

/// Identity of the executor running a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorId {
    /// The thread that pulled the item (direct and serial execution).
    Caller,
    /// Worker `index` of the pool created for one parallel run.
    Worker { pool: Ulid, index: usize },
}

impl ExecutorId {
    pub fn is_worker(&self) -> bool {
        matches!(self, Self::Worker { .. })
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => write!(f, "caller"),
            Self::Worker { pool, index } => write!(f, "worker-{}@{}", index, pool),
        }
    }
}

/// Per-item execution context handed to [`Transform::apply`].
///
/// The options are shared by every item of one run.
pub struct TaskContext<O> {
    options: Arc<O>,
    stage: Arc<str>,
    position: usize,
    executor: ExecutorId,
}

impl<O> TaskContext<O> {
    pub(crate) fn new(options: Arc<O>, stage: Arc<str>, position: usize) -> Self {
        Self {
            options,
            stage,
            position,
            executor: ExecutorId::Caller,
        }
    }

    pub(crate) fn on_executor(mut self, executor: ExecutorId) -> Self {
        self.executor = executor;
        self
    }

    /// Options supplied by the caller for this run.
    pub fn options(&self) -> &O {
        &self.options
    }

    /// Name of the stage running this task.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Zero-based position of the item in the input sequence.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn executor(&self) -> ExecutorId {
        self.executor
    }
}

impl<O> fmt::Debug for TaskContext<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("stage", &self.stage)
            .field("position", &self.position)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

/// A unary transformation usable as a pipeline stage.
///
/// Items and outputs cross thread boundaries when the stage runs on a pool,
/// hence the `Send + 'static` bounds.
pub trait Transform: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;
    type Options: Send + Sync + 'static;

    /// Transform one item.
    fn apply(
        &self,
        item: Self::Input,
        ctx: &TaskContext<Self::Options>,
    ) -> anyhow::Result<Self::Output>;

    /// Human-readable name used in errors and logs.
    fn name(&self) -> &str;
}

impl<T: Transform + ?Sized> Transform for Arc<T> {
    type Input = T::Input;
    type Output = T::Output;
    type Options = T::Options;

    fn apply(
        &self,
        item: Self::Input,
        ctx: &TaskContext<Self::Options>,
    ) -> anyhow::Result<Self::Output> {
        (**self).apply(item, ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// [`Transform`] backed by a closure. Built with [`from_fn`].
pub struct FnTransform<F, I, O, Opts> {
    name: String,
    func: F,
    _marker: PhantomData<fn(I, &Opts) -> O>,
}

impl<F, I, O, Opts> Transform for FnTransform<F, I, O, Opts>
where
    F: Fn(I, &TaskContext<Opts>) -> anyhow::Result<O> + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
    Opts: Send + Sync + 'static,
{
    type Input = I;
    type Output = O;
    type Options = Opts;

    fn apply(&self, item: I, ctx: &TaskContext<Opts>) -> anyhow::Result<O> {
        (self.func)(item, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F, I, O, Opts> fmt::Debug for FnTransform<F, I, O, Opts> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wrap a closure as a named [`Transform`].
///
/// ```ignore
/// let square = from_fn("square", |x: i64, _: &TaskContext<()>| Ok(x * x));
/// ```
pub fn from_fn<I, O, Opts, F>(name: impl Into<String>, func: F) -> FnTransform<F, I, O, Opts>
where
    F: Fn(I, &TaskContext<Opts>) -> anyhow::Result<O> + Send + Sync + 'static,
{
    FnTransform {
        name: name.into(),
        func,
        _marker: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Scale {
        factor: i64,
    }

    #[test]
    fn test_from_fn_applies_closure_with_options() {
        let scale = from_fn("scale", |x: i64, ctx: &TaskContext<Scale>| {
            Ok(x * ctx.options().factor)
        });
        let ctx = TaskContext::new(Arc::new(Scale { factor: 3 }), Arc::from("scale"), 0);

        assert_eq!(scale.apply(4, &ctx).unwrap(), 12);
        assert_eq!(scale.name(), "scale");
    }

    #[test]
    fn test_arc_transform_delegates() {
        let square: Arc<dyn Transform<Input = i64, Output = i64, Options = ()>> =
            Arc::new(from_fn("square", |x: i64, _: &TaskContext<()>| Ok(x * x)));
        let ctx = TaskContext::new(Arc::new(()), Arc::from("square"), 0);

        assert_eq!(square.apply(5, &ctx).unwrap(), 25);
        assert_eq!(Transform::name(&square), "square");
    }

    #[test]
    fn test_context_defaults_to_caller() {
        let ctx = TaskContext::new(Arc::new(()), Arc::from("noop"), 3);
        assert_eq!(ctx.executor(), ExecutorId::Caller);
        assert_eq!(ctx.position(), 3);
        assert_eq!(ctx.stage(), "noop");

        let pool = Ulid::new();
        let ctx = ctx.on_executor(ExecutorId::Worker { pool, index: 1 });
        assert!(ctx.executor().is_worker());
        assert_eq!(ctx.executor().to_string(), format!("worker-1@{}", pool));
    }
}
