//! Nodes and the behavior contract they execute.

use std::any::{Any, type_name};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use strata_store::{Value, ValueStore};
use tokio_util::sync::CancellationToken;

/// Error type returned by node behaviors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything a behavior can see while it runs.
#[derive(Clone)]
pub struct NodeContext {
  key: String,
  cancel: CancellationToken,
  store: Arc<ValueStore>,
}

impl NodeContext {
  pub fn new(key: impl Into<String>, cancel: CancellationToken, store: Arc<ValueStore>) -> Self {
    Self {
      key: key.into(),
      cancel,
      store,
    }
  }

  /// Key of the node being executed.
  pub fn key(&self) -> &str {
    &self.key
  }

  /// Token supplied by the caller of the run. The engine never cancels it
  /// itself; behaviors that honor deadlines watch it.
  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn store(&self) -> &Arc<ValueStore> {
    &self.store
  }

  pub fn load(&self, key: &str) -> Option<Value> {
    self.store.get(key)
  }

  pub fn load_as<T: Any + Clone>(&self, key: &str) -> Option<T> {
    self.store.get_as(key)
  }

  /// Like [`load_as`](Self::load_as), but a missing or mistyped value is an error.
  pub fn require_as<T: Any + Clone>(&self, key: &str) -> Result<T, BoxError> {
    self.store.get_as(key).ok_or_else(|| {
      format!(
        "node '{}' requires '{}' as {}",
        self.key,
        key,
        type_name::<T>()
      )
      .into()
    })
  }
}

impl fmt::Debug for NodeContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NodeContext")
      .field("key", &self.key)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish()
  }
}

/// The executable part of a node.
///
/// Any `Fn(NodeContext) -> impl Future<Output = Result<Value, BoxError>>`
/// closure is a behavior. Dependencies are resolved inside the behavior by
/// reading the [`NodeContext`].
pub trait Behavior: Send + Sync {
  fn call(&self, ctx: NodeContext) -> BoxFuture<'static, Result<Value, BoxError>>;
}

impl<F, Fut> Behavior for F
where
  F: Fn(NodeContext) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
  fn call(&self, ctx: NodeContext) -> BoxFuture<'static, Result<Value, BoxError>> {
    Box::pin(self(ctx))
  }
}

/// Caller-side description of a node, before it gets a key.
pub struct NodeDescriptor {
  dependencies: BTreeSet<String>,
  stores_output: bool,
  behavior: Arc<dyn Behavior>,
}

impl NodeDescriptor {
  /// Describe a node from a closure. Output is stored by default.
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
  {
    Self::from_behavior(f)
  }

  pub fn from_behavior(behavior: impl Behavior + 'static) -> Self {
    Self {
      dependencies: BTreeSet::new(),
      stores_output: true,
      behavior: Arc::new(behavior),
    }
  }

  pub fn depends_on(mut self, key: impl Into<String>) -> Self {
    self.dependencies.insert(key.into());
    self
  }

  pub fn with_dependencies<I, S>(mut self, keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies.extend(keys.into_iter().map(Into::into));
    self
  }

  /// Whether the produced value is written to the store on success.
  pub fn stores_output(mut self, stores_output: bool) -> Self {
    self.stores_output = stores_output;
    self
  }
}

/// A registered unit of work. Immutable once created.
pub struct Node {
  key: String,
  dependencies: BTreeSet<String>,
  stores_output: bool,
  behavior: Arc<dyn Behavior>,
}

impl Node {
  pub(crate) fn new(key: String, descriptor: NodeDescriptor) -> Self {
    Self {
      key,
      dependencies: descriptor.dependencies,
      stores_output: descriptor.stores_output,
      behavior: descriptor.behavior,
    }
  }

  /// The key this node produces.
  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn dependencies(&self) -> &BTreeSet<String> {
    &self.dependencies
  }

  pub fn stores_output(&self) -> bool {
    self.stores_output
  }

  /// Run the behavior. Storing the result is up to the caller.
  pub fn execute(&self, ctx: NodeContext) -> BoxFuture<'static, Result<Value, BoxError>> {
    self.behavior.call(ctx)
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("key", &self.key)
      .field("dependencies", &self.dependencies)
      .field("stores_output", &self.stores_output)
      .finish()
  }
}
