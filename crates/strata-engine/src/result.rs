//! Run results.

use serde::{Deserialize, Serialize};

/// Summary of a completed (or stopped) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub execution_id: String,
  /// Layers that ran to completion.
  pub layers_executed: usize,
  /// Nodes that completed successfully.
  pub nodes_executed: usize,
  /// Whether the run ended early because a stop was requested.
  pub stopped: bool,
}
