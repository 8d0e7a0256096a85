use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::StoreError;

/// An opaque value held in the store.
///
/// Values are shared, never copied: a read hands out another reference to
/// the same allocation.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value for storage.
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
  Arc::new(v)
}

/// A single key/value tier behind a reader/writer lock.
#[derive(Default)]
struct Tier {
  values: RwLock<HashMap<String, Value>>,
}

impl Tier {
  fn get(&self, key: &str) -> Option<Value> {
    let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
    values.get(key).cloned()
  }

  fn set(&self, key: String, v: Value) {
    let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
    values.insert(key, v);
  }

  fn contains(&self, key: &str) -> bool {
    let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
    values.contains_key(key)
  }

  fn keys(&self) -> Vec<String> {
    let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
    let mut keys: Vec<String> = values.keys().cloned().collect();
    keys.sort();
    keys
  }

  fn entries(&self) -> Vec<(String, Value)> {
    let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
    values
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }
}

/// Thread-safe two-tier value store.
///
/// The two tiers use separate locks, so seeding an initial value never
/// contends with a node writing its output.
#[derive(Default)]
pub struct ValueStore {
  produced: Tier,
  initial: Tier,
}

impl ValueStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up a value, preferring the produced tier over the initial tier.
  pub fn get(&self, key: &str) -> Option<Value> {
    self.produced.get(key).or_else(|| self.initial.get(key))
  }

  /// Look up a value and downcast it to `T`.
  ///
  /// A value stored under `key` with a different type reads as absent.
  pub fn get_as<T: Any + Clone>(&self, key: &str) -> Option<T> {
    self
      .get(key)
      .and_then(|v| v.downcast_ref::<T>().cloned())
  }

  /// Whether `key` resolves in either tier.
  pub fn contains(&self, key: &str) -> bool {
    self.produced.contains(key) || self.initial.contains(key)
  }

  /// Whether `key` was seeded into the initial tier.
  pub fn has_initial(&self, key: &str) -> bool {
    self.initial.contains(key)
  }

  /// Write a node's output. A later write for the same key replaces the
  /// earlier one.
  pub fn set_produced(&self, key: impl Into<String>, v: Value) -> Result<(), StoreError> {
    let key = non_empty(key.into())?;
    self.produced.set(key, v);
    Ok(())
  }

  /// Seed a baseline value. Produced values for the same key shadow it.
  pub fn set_initial(&self, key: impl Into<String>, v: Value) -> Result<(), StoreError> {
    let key = non_empty(key.into())?;
    self.initial.set(key, v);
    Ok(())
  }

  /// Keys currently held in the produced tier, sorted.
  pub fn produced_keys(&self) -> Vec<String> {
    self.produced.keys()
  }

  /// Keys currently held in the initial tier, sorted.
  pub fn initial_keys(&self) -> Vec<String> {
    self.initial.keys()
  }

  /// The union view of both tiers, with produced values taking precedence.
  pub fn snapshot(&self) -> HashMap<String, Value> {
    let mut merged: HashMap<String, Value> = self.initial.entries().into_iter().collect();
    merged.extend(self.produced.entries());
    merged
  }
}

impl fmt::Debug for ValueStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ValueStore")
      .field("produced", &self.produced.keys())
      .field("initial", &self.initial.keys())
      .finish()
  }
}

fn non_empty(key: String) -> Result<String, StoreError> {
  if key.is_empty() {
    return Err(StoreError::EmptyKey);
  }
  Ok(key)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_produced_shadows_initial() {
    let store = ValueStore::new();

    store.set_initial("k", value("init")).unwrap();
    assert_eq!(store.get_as::<&str>("k"), Some("init"));

    store.set_produced("k", value("computed")).unwrap();
    assert_eq!(store.get_as::<&str>("k"), Some("computed"));

    // The initial tier still holds the seed.
    assert!(store.has_initial("k"));
    assert_eq!(store.initial_keys(), vec!["k".to_string()]);
  }

  #[test]
  fn test_later_write_overwrites() {
    let store = ValueStore::new();

    store.set_produced("n", value(1u32)).unwrap();
    store.set_produced("n", value(2u32)).unwrap();

    assert_eq!(store.get_as::<u32>("n"), Some(2));
  }

  #[test]
  fn test_wrong_type_reads_as_absent() {
    let store = ValueStore::new();
    store.set_initial("n", value(7i64)).unwrap();

    assert!(store.contains("n"));
    assert_eq!(store.get_as::<String>("n"), None);
    assert_eq!(store.get_as::<i64>("n"), Some(7));
  }

  #[test]
  fn test_missing_key() {
    let store = ValueStore::new();
    assert!(store.get("missing").is_none());
    assert!(!store.contains("missing"));
  }

  #[test]
  fn test_empty_key_rejected() {
    let store = ValueStore::new();
    assert_eq!(store.set_initial("", value(1u8)), Err(StoreError::EmptyKey));
    assert_eq!(store.set_produced("", value(1u8)), Err(StoreError::EmptyKey));
    assert!(store.initial_keys().is_empty());
  }

  #[test]
  fn test_snapshot_merges_tiers() {
    let store = ValueStore::new();
    store.set_initial("a", value(1u32)).unwrap();
    store.set_initial("b", value(2u32)).unwrap();
    store.set_produced("b", value(20u32)).unwrap();
    store.set_produced("c", value(30u32)).unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot["a"].downcast_ref::<u32>(), Some(&1));
    assert_eq!(snapshot["b"].downcast_ref::<u32>(), Some(&20));
    assert_eq!(snapshot["c"].downcast_ref::<u32>(), Some(&30));
  }

  #[test]
  fn test_concurrent_writers() {
    let store = Arc::new(ValueStore::new());

    let handles: Vec<_> = (0..8u32)
      .map(|i| {
        let store = store.clone();
        std::thread::spawn(move || {
          store.set_produced(format!("k{}", i), value(i)).unwrap();
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(store.produced_keys().len(), 8);
    assert_eq!(store.get_as::<u32>("k5"), Some(5));
  }
}
