//! Thread-safe node registry.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::GraphError;
use crate::node::{Node, NodeDescriptor};

/// Mapping from produced key to [`Node`], plus the cooperative stop flag.
///
/// Planning reads a snapshot and never drains the registry, so the same
/// registrations can be planned any number of times.
#[derive(Debug, Default)]
pub struct Registry {
  nodes: RwLock<HashMap<String, Arc<Node>>>,
  stop: AtomicBool,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a node under `key`.
  ///
  /// Fails with [`GraphError::DuplicateKey`] if the key is taken; the
  /// existing registration is left as it was.
  pub fn register(
    &self,
    key: impl Into<String>,
    descriptor: NodeDescriptor,
  ) -> Result<Arc<Node>, GraphError> {
    let key = key.into();
    if key.is_empty() {
      return Err(GraphError::EmptyKey);
    }

    let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
    match nodes.entry(key) {
      Entry::Occupied(entry) => Err(GraphError::DuplicateKey(entry.key().clone())),
      Entry::Vacant(entry) => {
        let node = Arc::new(Node::new(entry.key().clone(), descriptor));
        debug!(key = %node.key(), dependencies = ?node.dependencies(), "node_registered");
        entry.insert(node.clone());
        Ok(node)
      }
    }
  }

  /// Remove the node under `key`. Returns whether anything was removed.
  pub fn unregister(&self, key: &str) -> bool {
    let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
    nodes.remove(key).is_some()
  }

  pub fn exists(&self, key: &str) -> bool {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.contains_key(key)
  }

  pub fn lookup(&self, key: &str) -> Option<Arc<Node>> {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.get(key).cloned()
  }

  /// Drop every registration.
  pub fn clear_all(&self) {
    let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
    nodes.clear();
  }

  pub fn len(&self) -> usize {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Registered keys, sorted.
  pub fn keys(&self) -> Vec<String> {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    let mut keys: Vec<String> = nodes.keys().cloned().collect();
    keys.sort();
    keys
  }

  /// Shallow copy of the node map.
  pub(crate) fn snapshot(&self) -> HashMap<String, Arc<Node>> {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.clone()
  }

  /// Ask a running execution to stop at its next layer boundary.
  pub fn request_stop(&self) {
    self.stop.store(true, Ordering::SeqCst);
  }

  pub fn is_stop_requested(&self) -> bool {
    self.stop.load(Ordering::SeqCst)
  }

  /// Reset the stop flag. The engine calls this when a run exits.
  pub fn clear_stop(&self) {
    self.stop.store(false, Ordering::SeqCst);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::BoxError;
  use strata_store::{Value, value};

  fn noop() -> NodeDescriptor {
    NodeDescriptor::new(|_ctx| async { Ok::<Value, BoxError>(value(())) })
  }

  #[test]
  fn test_register_and_lookup() {
    let registry = Registry::new();
    registry.register("a", noop().depends_on("x")).unwrap();

    assert!(registry.exists("a"));
    assert!(!registry.exists("b"));

    let node = registry.lookup("a").unwrap();
    assert_eq!(node.key(), "a");
    assert!(node.dependencies().contains("x"));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn test_duplicate_key_keeps_first_registration() {
    let registry = Registry::new();
    registry.register("a", noop().depends_on("first")).unwrap();

    let err = registry
      .register("a", noop().depends_on("second"))
      .unwrap_err();
    assert_eq!(err, GraphError::DuplicateKey("a".to_string()));

    let node = registry.lookup("a").unwrap();
    assert!(node.dependencies().contains("first"));
    assert!(!node.dependencies().contains("second"));
  }

  #[test]
  fn test_empty_key_rejected() {
    let registry = Registry::new();
    assert_eq!(registry.register("", noop()).unwrap_err(), GraphError::EmptyKey);
    assert!(registry.is_empty());
  }

  #[test]
  fn test_unregister_then_register_again() {
    let registry = Registry::new();
    registry.register("a", noop()).unwrap();

    assert!(registry.unregister("a"));
    assert!(!registry.unregister("a"));
    assert!(registry.register("a", noop()).is_ok());
  }

  #[test]
  fn test_clear_all() {
    let registry = Registry::new();
    registry.register("a", noop()).unwrap();
    registry.register("b", noop()).unwrap();
    assert_eq!(registry.keys(), vec!["a".to_string(), "b".to_string()]);

    registry.clear_all();
    assert!(registry.is_empty());
  }

  #[test]
  fn test_stop_flag_is_idempotent() {
    let registry = Registry::new();
    assert!(!registry.is_stop_requested());

    registry.request_stop();
    registry.request_stop();
    assert!(registry.is_stop_requested());

    registry.clear_stop();
    assert!(!registry.is_stop_requested());
  }
}
