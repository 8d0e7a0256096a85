//! Layer planning.
//!
//! Nodes are peeled off the pending set one pass at a time. A node joins the
//! current layer only when none of its dependencies is still pending and none
//! was scheduled earlier in the same pass, so a layer never contains both a
//! node and one of its dependencies, whatever order the pass visits them in.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use strata_store::ValueStore;
use tracing::debug;

use crate::error::GraphError;
use crate::node::Node;
use crate::registry::Registry;

/// A set of mutually independent nodes.
#[derive(Debug, Clone, Default)]
pub struct Layer {
  nodes: Vec<Arc<Node>>,
}

impl Layer {
  pub fn nodes(&self) -> &[Arc<Node>] {
    &self.nodes
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Keys of the member nodes, sorted.
  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.nodes.iter().map(|n| n.key().to_string()).collect();
    keys.sort();
    keys
  }
}

/// Ordered layers. Every dependency of a node in layer `i` is either an
/// initial value or produced by a node in a layer before `i`.
#[derive(Debug, Clone, Default)]
pub struct Plan {
  layers: Vec<Layer>,
}

impl Plan {
  pub fn layers(&self) -> &[Layer] {
    &self.layers
  }

  pub fn len(&self) -> usize {
    self.layers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.layers.is_empty()
  }

  pub fn node_count(&self) -> usize {
    self.layers.iter().map(Layer::len).sum()
  }

  pub fn layer_keys(&self) -> Vec<Vec<String>> {
    self.layers.iter().map(Layer::keys).collect()
  }

  /// Index of the layer holding `key`, if it was planned.
  pub fn layer_of(&self, key: &str) -> Option<usize> {
    self
      .layers
      .iter()
      .position(|layer| layer.nodes.iter().any(|n| n.key() == key))
  }
}

/// Resolve the registry into ordered layers.
///
/// Works on a snapshot of the registry, which is left untouched. `store`
/// supplies the initial tier that may satisfy dependencies without a
/// producing node.
pub fn plan(registry: &Registry, store: &ValueStore) -> Result<Plan, GraphError> {
  let registered = registry.snapshot();
  let mut pending: HashMap<String, Arc<Node>> = registered.clone();
  let mut layers = Vec::new();

  while !pending.is_empty() {
    let mut scheduled: HashSet<String> = HashSet::new();
    let mut members: Vec<Arc<Node>> = Vec::new();
    let mut candidates: Vec<Arc<Node>> = pending.values().cloned().collect();
    candidates.sort_by(|a, b| a.key().cmp(b.key()));

    'nodes: for node in candidates {
      for dep in node.dependencies() {
        if !registered.contains_key(dep) && !store.has_initial(dep) {
          return Err(GraphError::UnknownDependency {
            key: dep.clone(),
            dependent: node.key().to_string(),
          });
        }
      }

      let blocked = node
        .dependencies()
        .iter()
        .any(|dep| pending.contains_key(dep) || scheduled.contains(dep));
      if blocked {
        continue 'nodes;
      }

      pending.remove(node.key());
      scheduled.insert(node.key().to_string());
      members.push(node);
    }

    if members.is_empty() {
      let mut keys: Vec<String> = pending.into_keys().collect();
      keys.sort();
      return Err(GraphError::CyclicDependency(keys));
    }

    debug!(layer = layers.len(), nodes = members.len(), "layer_planned");
    layers.push(Layer { nodes: members });
  }

  Ok(Plan { layers })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::{BoxError, NodeDescriptor};
  use strata_store::{Value, value};

  fn node(deps: &[&str]) -> NodeDescriptor {
    NodeDescriptor::new(|_ctx| async { Ok::<Value, BoxError>(value(())) }).with_dependencies(deps.iter().copied())
  }

  fn keys(layer: &[&str]) -> Vec<String> {
    layer.iter().map(|k| k.to_string()).collect()
  }

  #[test]
  fn test_empty_registry_plans_nothing() {
    let plan = plan(&Registry::new(), &ValueStore::new()).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.node_count(), 0);
  }

  #[test]
  fn test_diamond() {
    //   a
    //  / \
    // b   c
    //  \ /
    //   d
    let registry = Registry::new();
    registry.register("a", node(&[])).unwrap();
    registry.register("b", node(&["a"])).unwrap();
    registry.register("c", node(&["a"])).unwrap();
    registry.register("d", node(&["b", "c"])).unwrap();

    let plan = plan(&registry, &ValueStore::new()).unwrap();
    assert_eq!(
      plan.layer_keys(),
      vec![keys(&["a"]), keys(&["b", "c"]), keys(&["d"])]
    );
    assert_eq!(plan.layer_of("d"), Some(2));
    assert_eq!(plan.layer_of("missing"), None);
  }

  #[test]
  fn test_chain_never_collapses_into_one_layer() {
    // Each link waits for the pass after its dependency.
    let registry = Registry::new();
    registry.register("n0", node(&[])).unwrap();
    for i in 1..10 {
      let dep = format!("n{}", i - 1);
      registry
        .register(format!("n{}", i), node(&[dep.as_str()]))
        .unwrap();
    }

    let plan = plan(&registry, &ValueStore::new()).unwrap();
    assert_eq!(plan.len(), 10);
    for (i, layer) in plan.layers().iter().enumerate() {
      assert_eq!(layer.keys(), vec![format!("n{}", i)]);
    }
  }

  #[test]
  fn test_dependency_visited_first_still_blocks_dependent() {
    // Passes visit in key order: "a" is scheduled before "b" sees it, while
    // "y" is seen before "z" is scheduled.
    let registry = Registry::new();
    registry.register("a", node(&[])).unwrap();
    registry.register("b", node(&["a"])).unwrap();
    registry.register("y", node(&["z"])).unwrap();
    registry.register("z", node(&[])).unwrap();

    let plan = plan(&registry, &ValueStore::new()).unwrap();
    assert_eq!(plan.layer_keys(), vec![keys(&["a", "z"]), keys(&["b", "y"])]);
  }

  #[test]
  fn test_initial_values_satisfy_dependencies() {
    let registry = Registry::new();
    registry.register("b", node(&["seed"])).unwrap();
    registry.register("c", node(&["b", "seed"])).unwrap();

    let store = ValueStore::new();
    store.set_initial("seed", value(1u32)).unwrap();

    let plan = plan(&registry, &store).unwrap();
    assert_eq!(plan.layer_keys(), vec![keys(&["b"]), keys(&["c"])]);
  }

  #[test]
  fn test_produced_values_do_not_satisfy_dependencies() {
    let registry = Registry::new();
    registry.register("b", node(&["x"])).unwrap();

    let store = ValueStore::new();
    store.set_produced("x", value(1u32)).unwrap();

    let err = plan(&registry, &store).unwrap_err();
    assert_eq!(
      err,
      GraphError::UnknownDependency {
        key: "x".to_string(),
        dependent: "b".to_string(),
      }
    );
  }

  #[test]
  fn test_unknown_dependency() {
    let registry = Registry::new();
    registry.register("a", node(&[])).unwrap();
    registry.register("b", node(&["a", "X"])).unwrap();

    let err = plan(&registry, &ValueStore::new()).unwrap_err();
    assert!(matches!(err, GraphError::UnknownDependency { ref key, .. } if key == "X"));
  }

  #[test]
  fn test_unknown_dependency_reported_before_cycle() {
    let registry = Registry::new();
    registry.register("a", node(&["b", "zz"])).unwrap();
    registry.register("b", node(&["a"])).unwrap();

    let err = plan(&registry, &ValueStore::new()).unwrap_err();
    assert!(matches!(err, GraphError::UnknownDependency { ref key, .. } if key == "zz"));
  }

  #[test]
  fn test_two_node_cycle() {
    let registry = Registry::new();
    registry.register("A", node(&["B"])).unwrap();
    registry.register("B", node(&["A"])).unwrap();

    let err = plan(&registry, &ValueStore::new()).unwrap_err();
    assert_eq!(
      err,
      GraphError::CyclicDependency(vec!["A".to_string(), "B".to_string()])
    );
  }

  #[test]
  fn test_cycle_after_progress() {
    let registry = Registry::new();
    registry.register("root", node(&[])).unwrap();
    registry.register("x", node(&["root", "z"])).unwrap();
    registry.register("y", node(&["x"])).unwrap();
    registry.register("z", node(&["y"])).unwrap();
    registry.register("self", node(&["self"])).unwrap();

    let err = plan(&registry, &ValueStore::new()).unwrap_err();
    assert_eq!(
      err,
      GraphError::CyclicDependency(vec![
        "self".to_string(),
        "x".to_string(),
        "y".to_string(),
        "z".to_string(),
      ])
    );
  }

  #[test]
  fn test_replanning_keeps_registry_and_membership() {
    let registry = Registry::new();
    registry.register("a", node(&[])).unwrap();
    registry.register("b", node(&[])).unwrap();
    registry.register("c", node(&["a", "b"])).unwrap();
    registry.register("d", node(&["a"])).unwrap();

    let store = ValueStore::new();
    let first = plan(&registry, &store).unwrap();
    let second = plan(&registry, &store).unwrap();

    assert_eq!(first.layer_keys(), second.layer_keys());
    assert_eq!(registry.len(), 4);
  }
}
