//! Error types for planning and execution.

use strata_config::ConfigError;
use strata_graph::{BoxError, GraphError};
use strata_store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`Dag`](crate::Dag) operations.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// The engine configuration was rejected.
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// Registration or planning failed.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// Writing a value failed.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// A node's behavior returned an error.
  #[error("node '{key}' failed: {source}")]
  NodeFailure {
    key: String,
    #[source]
    source: BoxError,
  },

  /// A node's behavior panicked; the panic was contained.
  #[error("node '{key}' panicked: {message}")]
  PanicRecovered { key: String, message: String },

  /// A node task ended without producing a result.
  #[error("node '{key}' was aborted")]
  TaskAborted { key: String },
}

impl ExecutionError {
  /// Key of the node the error originated from, if any.
  pub fn node_key(&self) -> Option<&str> {
    match self {
      Self::NodeFailure { key, .. } | Self::PanicRecovered { key, .. } | Self::TaskAborted { key } => {
        Some(key.as_str())
      }
      Self::Config(_) | Self::Graph(_) | Self::Store(_) => None,
    }
  }
}
