use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use strata_config::{GraphDef, NodeDef};
use strata_engine::{BoxError, Dag, NodeContext, NodeDescriptor, Value, value};

/// Strata - plan and run layered dependency graphs
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the execution layers of a graph definition
  Plan {
    /// Path to the graph definition (JSON)
    graph_file: PathBuf,
  },

  /// Plan and run a graph definition, printing every stored value
  Run {
    /// Path to the graph definition (JSON)
    graph_file: PathBuf,
  },
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Plan { graph_file }) => plan_graph(graph_file)?,
    Some(Commands::Run { graph_file }) => run_graph(graph_file)?,
    None => {
      println!("strata - use --help to see available commands");
    }
  }

  Ok(())
}

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();
}

fn plan_graph(graph_file: PathBuf) -> Result<()> {
  let def = load_definition(&graph_file)?;
  let dag = build_dag(&def)?;
  dag.plan().context("failed to plan graph")?;

  let layers = dag.current_plan().layer_keys();
  eprintln!("Planned {} layers", layers.len());
  println!("{}", serde_json::to_string_pretty(&layers)?);
  Ok(())
}

fn run_graph(graph_file: PathBuf) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_graph_async(graph_file).await })
}

async fn run_graph_async(graph_file: PathBuf) -> Result<()> {
  let def = load_definition(&graph_file)?;
  let dag = Arc::new(build_dag(&def)?);
  dag.plan().context("failed to plan graph")?;

  // Ctrl-C stops the run at the next layer boundary
  let stopper = {
    let dag = dag.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Stop requested, finishing current layer");
        dag.request_stop();
      }
    })
  };

  let cancel = CancellationToken::new();
  let result = dag.run(cancel).await;
  stopper.abort();
  let report = result.context("graph execution failed")?;

  eprintln!(
    "Execution {} ran {} layers ({} nodes){}",
    report.execution_id,
    report.layers_executed,
    report.nodes_executed,
    if report.stopped { ", stopped early" } else { "" }
  );

  let output: BTreeMap<String, serde_json::Value> = dag
    .store()
    .snapshot()
    .into_iter()
    .filter_map(|(key, v)| {
      v.downcast_ref::<serde_json::Value>()
        .map(|json| (key, json.clone()))
    })
    .collect();

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

fn load_definition(graph_file: &Path) -> Result<GraphDef> {
  let def = GraphDef::from_file(graph_file)
    .with_context(|| format!("failed to load graph file: {}", graph_file.display()))?;
  eprintln!("Loaded graph: {} ({} nodes)", def.name, def.nodes.len());
  Ok(def)
}

fn build_dag(def: &GraphDef) -> Result<Dag> {
  let dag = Dag::with_config(def.engine.clone()).context("invalid engine configuration")?;

  for (key, json) in &def.initial {
    dag
      .seed_initial_value(key.clone(), value(json.clone()))
      .with_context(|| format!("failed to seed '{}'", key))?;
  }

  for node in &def.nodes {
    dag
      .register(node.key.clone(), describe(node))
      .with_context(|| format!("failed to register node '{}'", node.key))?;
  }

  Ok(dag)
}

/// Canned behavior for a declared node: optional delay, optional failure,
/// otherwise `{ "output": .., "inputs": { dep: value } }`.
fn describe(node: &NodeDef) -> NodeDescriptor {
  let deps = node.depends_on.clone();
  let output = node.output.clone().unwrap_or(serde_json::Value::Null);
  let fail = node.fail.clone();
  let delay = node.delay_ms.map(Duration::from_millis);

  NodeDescriptor::new(move |ctx: NodeContext| {
    let deps = deps.clone();
    let output = output.clone();
    let fail = fail.clone();
    async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      if let Some(message) = fail {
        return Err(BoxError::from(message));
      }

      let mut inputs = serde_json::Map::new();
      for dep in &deps {
        let input: serde_json::Value = ctx.require_as(dep)?;
        inputs.insert(dep.clone(), input);
      }
      Ok::<Value, BoxError>(value(serde_json::json!({
        "output": output,
        "inputs": inputs,
      })))
    }
  })
  .with_dependencies(node.depends_on.iter().cloned())
  .stores_output(node.store_output)
}
