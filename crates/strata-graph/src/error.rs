use thiserror::Error;

/// Errors raised while registering nodes or planning layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
  #[error("node already registered: {0}")]
  DuplicateKey(String),

  #[error("node key must not be empty")]
  EmptyKey,

  #[error("node '{dependent}' depends on unknown key '{key}'")]
  UnknownDependency { key: String, dependent: String },

  /// A planning pass made no progress; carries the unresolved keys, sorted.
  #[error("cyclic dependency among: {}", .0.join(", "))]
  CyclicDependency(Vec<String>),
}
