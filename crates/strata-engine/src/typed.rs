//! Typed registration sugar.
//!
//! Keys follow one convention: a type's key is its [`type_name`]. Nodes that
//! produce a `T` are registered under `type_key::<T>()`, and consumers depend
//! on that key. Explicitly named variants exist for graphs holding several
//! values of the same type.

use std::any::{Any, type_name};
use std::future::Future;

use strata_graph::{BoxError, GraphError, NodeContext, NodeDescriptor};
use strata_store::{StoreError, Value, value};

use crate::dag::Dag;
use crate::events::ExecutionNotifier;

/// The key under which values of type `T` are stored.
pub fn type_key<T: ?Sized + 'static>() -> String {
  type_name::<T>().to_string()
}

impl<N: ExecutionNotifier> Dag<N> {
  /// Register a node producing a `T` under `type_key::<T>()`.
  pub fn provide<T, F, Fut>(&self, dependencies: &[&str], f: F) -> Result<String, GraphError>
  where
    T: Any + Send + Sync,
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
  {
    self.provide_named(type_key::<T>(), dependencies, f)
  }

  /// Register a node producing a `T` under an explicit key.
  pub fn provide_named<T, F, Fut>(
    &self,
    key: impl Into<String>,
    dependencies: &[&str],
    f: F,
  ) -> Result<String, GraphError>
  where
    T: Any + Send + Sync,
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
  {
    let key = key.into();
    let descriptor = NodeDescriptor::new(move |ctx| {
      let produced = f(ctx);
      async move { produced.await.map(value) }
    })
    .with_dependencies(dependencies.iter().copied());

    self.register(key.clone(), descriptor)?;
    Ok(key)
  }

  /// Register a node run only for its side effects. Its output is never
  /// stored, and it gets a generated key, which is returned.
  pub fn register_sink<F, Fut>(&self, dependencies: &[&str], f: F) -> Result<String, GraphError>
  where
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
  {
    let key = format!("sink-{}", uuid::Uuid::new_v4());
    let descriptor = NodeDescriptor::new(move |ctx| {
      let done = f(ctx);
      async move { done.await.map(|()| value(())) }
    })
    .with_dependencies(dependencies.iter().copied())
    .stores_output(false);

    self.register(key.clone(), descriptor)?;
    Ok(key)
  }

  /// Seed a `T` into the initial tier under `type_key::<T>()`.
  pub fn seed<T: Any + Send + Sync>(&self, v: T) -> Result<(), StoreError> {
    self.seed_initial_value(type_key::<T>(), value(v))
  }

  pub fn load_as<T: Any + Clone>(&self, key: &str) -> Option<T> {
    self.store().get_as(key)
  }

  /// Read the `T` stored under `type_key::<T>()`.
  pub fn load_typed<T: Any + Clone>(&self) -> Option<T> {
    self.load_as(&type_key::<T>())
  }
}

/// Downcast a raw [`Value`] to `T`.
pub fn downcast<T: Any + Clone>(v: &Value) -> Option<T> {
  v.downcast_ref::<T>().cloned()
}
