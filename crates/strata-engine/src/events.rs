//! Execution events and notifiers for observability.
//!
//! Events are emitted while a plan runs so callers can follow progress,
//! record timings, stream to a UI, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A run has started.
  RunStarted { execution_id: String, layers: usize },

  /// A layer's nodes are about to be spawned.
  LayerStarted {
    execution_id: String,
    layer: usize,
    keys: Vec<String>,
  },

  /// A node task has been spawned.
  NodeStarted {
    execution_id: String,
    layer: usize,
    key: String,
  },

  /// A node completed and, if it stores output, wrote its value.
  NodeCompleted {
    execution_id: String,
    layer: usize,
    key: String,
  },

  /// A node returned an error, panicked, or was aborted.
  NodeFailed {
    execution_id: String,
    layer: usize,
    key: String,
    error: String,
  },

  /// The stop flag was observed at a layer boundary.
  RunStopped {
    execution_id: String,
    layers_executed: usize,
  },

  /// All layers completed.
  RunCompleted {
    execution_id: String,
    layers_executed: usize,
  },

  /// A layer failed and the remaining layers were skipped.
  RunFailed { execution_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` from the task driving the run, never from
/// node tasks, so events of one run arrive in order.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded: notify runs on the task driving the layer barrier.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_notifier_delivers_in_order() {
    let (notifier, mut receiver) = ChannelNotifier::channel();

    notifier.notify(ExecutionEvent::RunStarted {
      execution_id: "e".to_string(),
      layers: 1,
    });
    notifier.notify(ExecutionEvent::RunCompleted {
      execution_id: "e".to_string(),
      layers_executed: 1,
    });

    assert!(matches!(
      receiver.try_recv(),
      Ok(ExecutionEvent::RunStarted { layers: 1, .. })
    ));
    assert!(matches!(
      receiver.try_recv(),
      Ok(ExecutionEvent::RunCompleted { .. })
    ));
  }

  #[test]
  fn test_channel_notifier_ignores_dropped_receiver() {
    let (notifier, receiver) = ChannelNotifier::channel();
    drop(receiver);

    notifier.notify(ExecutionEvent::RunFailed {
      execution_id: "e".to_string(),
      error: "boom".to_string(),
    });
  }
}
