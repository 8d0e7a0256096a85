//! The graph facade: registration, seeding, planning and running.

use std::sync::{Arc, PoisonError, RwLock};

use strata_config::EngineConfig;
use strata_graph::{GraphError, NodeDescriptor, Plan, Registry};
use strata_store::{StoreError, Value, ValueStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::ExecutionError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::executor::LayerExecutor;
use crate::result::RunReport;

/// A dependency graph together with its value store and current plan.
///
/// Registrations and values live as long as the `Dag` and survive any number
/// of plan/run cycles. There is no process-wide instance; callers own theirs.
///
/// Generic over `N: ExecutionNotifier` to allow different notification
/// strategies. Use [`Dag::new`] for no-op notifications or
/// [`Dag::with_notifier`] to observe events.
pub struct Dag<N: ExecutionNotifier = NoopNotifier> {
  registry: Registry,
  store: Arc<ValueStore>,
  plan: RwLock<Arc<Plan>>,
  config: EngineConfig,
  notifier: N,
}

impl Dag<NoopNotifier> {
  /// Create an empty graph with the default engine configuration.
  pub fn new() -> Self {
    Self::build(EngineConfig::default(), NoopNotifier)
  }

  pub fn with_config(config: EngineConfig) -> Result<Self, ExecutionError> {
    Self::with_notifier(config, NoopNotifier)
  }
}

impl Default for Dag<NoopNotifier> {
  fn default() -> Self {
    Self::new()
  }
}

impl<N: ExecutionNotifier> Dag<N> {
  /// Create an empty graph that reports run events to `notifier`.
  pub fn with_notifier(config: EngineConfig, notifier: N) -> Result<Self, ExecutionError> {
    config.validate()?;
    Ok(Self::build(config, notifier))
  }

  fn build(config: EngineConfig, notifier: N) -> Self {
    Self {
      registry: Registry::new(),
      store: Arc::new(ValueStore::new()),
      plan: RwLock::new(Arc::new(Plan::default())),
      config,
      notifier,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn store(&self) -> &Arc<ValueStore> {
    &self.store
  }

  pub fn notifier(&self) -> &N {
    &self.notifier
  }

  /// Register a node producing `key`.
  pub fn register(
    &self,
    key: impl Into<String>,
    descriptor: NodeDescriptor,
  ) -> Result<(), GraphError> {
    self.registry.register(key, descriptor).map(|_| ())
  }

  /// Remove the node producing `key`, if any. The current plan keeps
  /// running it until the next [`plan`](Self::plan).
  pub fn unregister(&self, key: &str) -> bool {
    self.registry.unregister(key)
  }

  pub fn exists(&self, key: &str) -> bool {
    self.registry.exists(key)
  }

  /// Drop all registrations. Stored values and the current plan are kept.
  pub fn clear(&self) {
    self.registry.clear_all();
  }

  /// Ask the current (or next) run to stop at its next layer boundary.
  pub fn request_stop(&self) {
    self.registry.request_stop();
  }

  /// Seed a value into the initial tier.
  pub fn seed_initial_value(&self, key: impl Into<String>, v: Value) -> Result<(), StoreError> {
    self.store.set_initial(key, v)
  }

  /// Read a value, produced tier first.
  pub fn load(&self, key: &str) -> Option<Value> {
    self.store.get(key)
  }

  /// Rebuild the layer plan from the current registrations.
  ///
  /// On failure the previous plan stays in place.
  #[instrument(name = "dag_plan", skip(self))]
  pub fn plan(&self) -> Result<(), GraphError> {
    let plan = strata_graph::plan(&self.registry, &self.store)?;

    info!(
      layers = plan.len(),
      nodes = plan.node_count(),
      "plan_ready"
    );

    let mut current = self.plan.write().unwrap_or_else(PoisonError::into_inner);
    *current = Arc::new(plan);
    Ok(())
  }

  /// The plan the next run will execute.
  pub fn current_plan(&self) -> Arc<Plan> {
    self
      .plan
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Execute the current plan.
  ///
  /// `cancel` is handed to every node behavior; the engine itself only
  /// observes the stop flag, which is cleared when this call returns.
  #[instrument(name = "dag_run", skip(self, cancel))]
  pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, ExecutionError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let plan = self.current_plan();

    let executor = LayerExecutor {
      registry: &self.registry,
      store: &self.store,
      notifier: &self.notifier,
      max_concurrency: self.config.max_concurrency,
    };
    executor.run(&plan, &execution_id, &cancel).await
  }
}
