use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// A declarative graph: seeded values plus nodes with canned behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
  pub name: String,
  #[serde(default)]
  pub engine: EngineConfig,
  /// Values seeded into the initial tier before planning.
  #[serde(default)]
  pub initial: BTreeMap<String, serde_json::Value>,
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub key: String,
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(default = "default_store_output")]
  pub store_output: bool,
  /// Static payload included in the node's produced value.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<serde_json::Value>,
  /// When set, the node fails with this message instead of producing a value.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fail: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub delay_ms: Option<u64>,
}

fn default_store_output() -> bool {
  true
}

impl GraphDef {
  /// Parse and validate a definition from JSON.
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    let def: GraphDef = serde_json::from_str(json)?;
    def.validate()?;
    Ok(def)
  }

  /// Read, parse and validate a definition file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&content)
  }

  /// Structural checks only. Dependency resolution is left to the planner.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.engine.validate()?;

    if self.initial.keys().any(|k| k.is_empty()) {
      return Err(ConfigError::invalid("initial value keys must not be empty"));
    }

    let mut seen = HashSet::new();
    for node in &self.nodes {
      if node.key.is_empty() {
        return Err(ConfigError::invalid("node keys must not be empty"));
      }
      if !seen.insert(node.key.as_str()) {
        return Err(ConfigError::invalid(format!(
          "duplicate node key '{}'",
          node.key
        )));
      }
    }
    Ok(())
  }
}
