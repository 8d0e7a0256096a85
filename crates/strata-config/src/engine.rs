use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the execution engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Upper bound on node tasks running at once within a layer.
  /// `None` runs every node of a layer concurrently.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_concurrency: Option<usize>,
}

impl EngineConfig {
  pub fn with_max_concurrency(max_concurrency: usize) -> Self {
    Self {
      max_concurrency: Some(max_concurrency),
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_concurrency == Some(0) {
      return Err(ConfigError::invalid("max_concurrency must be at least 1"));
    }
    Ok(())
  }
}
