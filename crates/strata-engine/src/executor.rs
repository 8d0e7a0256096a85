//! Layer-by-layer plan execution.
//!
//! Each layer is a barrier: every node of the layer is spawned, and the next
//! layer starts only after all of them have finished. The first failure of a
//! layer (error, panic or abort) becomes the run's error and later layers are
//! skipped. The stop flag is sampled once per layer boundary.

use std::any::Any;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use strata_graph::{Layer, Node, NodeContext, Plan, Registry};
use strata_store::ValueStore;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ExecutionError;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::result::RunReport;

/// Borrowed view of everything a run needs.
pub(crate) struct LayerExecutor<'a, N: ExecutionNotifier> {
  pub(crate) registry: &'a Registry,
  pub(crate) store: &'a Arc<ValueStore>,
  pub(crate) notifier: &'a N,
  pub(crate) max_concurrency: Option<usize>,
}

/// Clears the stop flag when the run exits, however it exits.
struct ResetStopOnExit<'a>(&'a Registry);

impl Drop for ResetStopOnExit<'_> {
  fn drop(&mut self) {
    self.0.clear_stop();
  }
}

impl<N: ExecutionNotifier> LayerExecutor<'_, N> {
  pub(crate) async fn run(
    &self,
    plan: &Plan,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<RunReport, ExecutionError> {
    let _reset = ResetStopOnExit(self.registry);

    info!(
      execution_id = %execution_id,
      layers = plan.len(),
      nodes = plan.node_count(),
      "run_started"
    );
    self.notifier.notify(ExecutionEvent::RunStarted {
      execution_id: execution_id.to_string(),
      layers: plan.len(),
    });

    let result = self.run_layers(plan, execution_id, cancel).await;

    match &result {
      Ok(report) if report.stopped => {
        warn!(
          execution_id = %execution_id,
          layers_executed = report.layers_executed,
          "run_stopped"
        );
        self.notifier.notify(ExecutionEvent::RunStopped {
          execution_id: execution_id.to_string(),
          layers_executed: report.layers_executed,
        });
      }
      Ok(report) => {
        info!(
          execution_id = %execution_id,
          layers_executed = report.layers_executed,
          nodes_executed = report.nodes_executed,
          "run_completed"
        );
        self.notifier.notify(ExecutionEvent::RunCompleted {
          execution_id: execution_id.to_string(),
          layers_executed: report.layers_executed,
        });
      }
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "run_failed");
        self.notifier.notify(ExecutionEvent::RunFailed {
          execution_id: execution_id.to_string(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  async fn run_layers(
    &self,
    plan: &Plan,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<RunReport, ExecutionError> {
    let permits = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
    let mut report = RunReport {
      execution_id: execution_id.to_string(),
      layers_executed: 0,
      nodes_executed: 0,
      stopped: false,
    };

    for (index, layer) in plan.layers().iter().enumerate() {
      if self.registry.is_stop_requested() {
        report.stopped = true;
        return Ok(report);
      }

      report.nodes_executed += self
        .run_layer(index, layer, execution_id, cancel, permits.as_ref())
        .await?;
      report.layers_executed += 1;
    }

    Ok(report)
  }

  /// Run one layer to completion. Returns the number of nodes that succeeded.
  async fn run_layer(
    &self,
    index: usize,
    layer: &Layer,
    execution_id: &str,
    cancel: &CancellationToken,
    permits: Option<&Arc<Semaphore>>,
  ) -> Result<usize, ExecutionError> {
    info!(
      execution_id = %execution_id,
      layer = index,
      nodes = layer.len(),
      "layer_started"
    );
    self.notifier.notify(ExecutionEvent::LayerStarted {
      execution_id: execution_id.to_string(),
      layer: index,
      keys: layer.keys(),
    });

    let mut tasks = FuturesUnordered::new();
    for node in layer.nodes() {
      let key = node.key().to_string();
      self.notifier.notify(ExecutionEvent::NodeStarted {
        execution_id: execution_id.to_string(),
        layer: index,
        key: key.clone(),
      });

      let ctx = NodeContext::new(key.clone(), cancel.clone(), self.store.clone());
      let handle = tokio::spawn(execute_node(node.clone(), ctx, permits.cloned()));
      tasks.push(async move { (key, handle.await) });
    }

    // Drain every task before deciding the layer's outcome.
    let mut first_error = None;
    let mut completed = 0;
    while let Some((key, joined)) = tasks.next().await {
      match joined.unwrap_or_else(|e| Err(join_error(&key, e))) {
        Ok(()) => {
          debug!(execution_id = %execution_id, layer = index, key = %key, "node_completed");
          self.notifier.notify(ExecutionEvent::NodeCompleted {
            execution_id: execution_id.to_string(),
            layer: index,
            key,
          });
          completed += 1;
        }
        Err(e) => {
          error!(
            execution_id = %execution_id,
            layer = index,
            key = %key,
            error = %e,
            "node_failed"
          );
          self.notifier.notify(ExecutionEvent::NodeFailed {
            execution_id: execution_id.to_string(),
            layer: index,
            key,
            error: e.to_string(),
          });
          if first_error.is_none() {
            first_error = Some(e);
          }
        }
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(completed),
    }
  }
}

/// Body of a spawned node task.
async fn execute_node(
  node: Arc<Node>,
  ctx: NodeContext,
  permits: Option<Arc<Semaphore>>,
) -> Result<(), ExecutionError> {
  let _permit = match permits {
    Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|_| {
      ExecutionError::TaskAborted {
        key: node.key().to_string(),
      }
    })?),
    None => None,
  };

  let store = ctx.store().clone();
  let output = node
    .execute(ctx)
    .await
    .map_err(|source| ExecutionError::NodeFailure {
      key: node.key().to_string(),
      source,
    })?;

  if node.stores_output() {
    store.set_produced(node.key(), output)?;
  }
  Ok(())
}

fn join_error(key: &str, err: JoinError) -> ExecutionError {
  if err.is_panic() {
    let payload = err.into_panic();
    ExecutionError::PanicRecovered {
      key: key.to_string(),
      message: panic_message(payload.as_ref()),
    }
  } else {
    ExecutionError::TaskAborted {
      key: key.to_string(),
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_panic_message_payloads() {
    let payload: Box<dyn Any + Send> = Box::new("static message");
    assert_eq!(panic_message(payload.as_ref()), "static message");

    let payload: Box<dyn Any + Send> = Box::new(String::from("formatted 42"));
    assert_eq!(panic_message(payload.as_ref()), "formatted 42");

    let payload: Box<dyn Any + Send> = Box::new(42u8);
    assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
  }

  #[tokio::test]
  async fn test_join_error_from_panic() {
    let handle = tokio::spawn(async {
      if true {
        panic!("kaboom");
      }
    });
    let err = handle.await.unwrap_err();

    match join_error("boom", err) {
      ExecutionError::PanicRecovered { key, message } => {
        assert_eq!(key, "boom");
        assert_eq!(message, "kaboom");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_join_error_from_abort() {
    let handle = tokio::spawn(std::future::pending::<()>());
    handle.abort();
    let err = handle.await.unwrap_err();

    assert!(matches!(
      join_error("slow", err),
      ExecutionError::TaskAborted { ref key } if key == "slow"
    ));
  }
}
