//! Name-based lookup of transformations.

use std::collections::HashMap;
use std::sync::Arc;

use stagepipe_shared::errors::{StageError, StageResult};

use super::options::StageConfig;
use super::Stage;
use crate::pool::PoolFactory;
use crate::transform::Transform;

/// Shared, type-erased transformation.
pub type DynTransform<I, O, Opts> = Arc<dyn Transform<Input = I, Output = O, Options = Opts>>;

/// Transformations of one signature, addressable by name so stages can be
/// described by [`StageConfig`].
pub struct TransformRegistry<I, O, Opts> {
    transforms: HashMap<String, DynTransform<I, O, Opts>>,
    pool_factory: Option<Arc<dyn PoolFactory>>,
}

impl<I, O, Opts> TransformRegistry<I, O, Opts>
where
    I: Send + 'static,
    O: Send + 'static,
    Opts: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            transforms: HashMap::new(),
            pool_factory: None,
        }
    }

    /// Pool factory handed to every stage built from this registry.
    pub fn with_pool_factory(mut self, factory: Arc<dyn PoolFactory>) -> Self {
        self.pool_factory = Some(factory);
        self
    }

    /// Register `transform` under its own name.
    pub fn register<T>(&mut self, transform: T) -> StageResult<()>
    where
        T: Transform<Input = I, Output = O, Options = Opts>,
    {
        let name = transform.name().to_string();
        if name.is_empty() {
            return Err(StageError::InvalidArgument(
                "transform name must not be empty".to_string(),
            ));
        }
        if self.transforms.contains_key(&name) {
            return Err(StageError::Config(format!(
                "transform '{}' is already registered",
                name
            )));
        }

        tracing::debug!(transform = %name, "Registered transform");
        self.transforms.insert(name, Arc::new(transform));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn resolve(&self, name: &str) -> StageResult<DynTransform<I, O, Opts>> {
        if name.is_empty() {
            return Err(StageError::InvalidArgument(
                "transform name must not be empty".to_string(),
            ));
        }

        self.transforms.get(name).cloned().ok_or_else(|| {
            StageError::Config(format!(
                "transform '{}' is not registered (known: {})",
                name,
                self.names().join(", ")
            ))
        })
    }

    /// Resolve the named transform and build a stage with the given options.
    pub fn build_stage(
        &self,
        config: &StageConfig,
    ) -> StageResult<Stage<DynTransform<I, O, Opts>>> {
        let transform = self.resolve(&config.transform)?;
        let mut builder = Stage::builder(transform).options(config.options.clone());
        if let Some(factory) = &self.pool_factory {
            builder = builder.pool_factory(Arc::clone(factory));
        }
        builder.build()
    }
}

impl<I, O, Opts> Default for TransformRegistry<I, O, Opts>
where
    I: Send + 'static,
    O: Send + 'static,
    Opts: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
