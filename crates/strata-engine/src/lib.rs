//! Strata Engine
//!
//! This crate runs dependency graphs built from `strata-graph` nodes:
//! - [`Dag`] is the entry point: register nodes, seed values, plan, run
//! - plans execute layer by layer; all nodes of a layer run concurrently and
//!   the next layer starts only when the whole layer has finished
//! - the first failing node (error or panic) aborts the remaining layers
//! - a stop request is honored at the next layer boundary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            Dag                              │
//! │  - register / unregister / clear / request_stop             │
//! │  - seed_initial_value / load                                │
//! │  - plan() → layers, run(cancel) → RunReport                 │
//! └─────────────────────────────────────────────────────────────┘
//!           │                   │                    │
//!           ▼                   ▼                    ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │     Registry     │ │     Planner      │ │  LayerExecutor   │
//! │  key → Node      │ │  snapshot →      │ │  spawn per node, │
//! │  stop flag       │ │  ordered layers  │ │  barrier, events │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//!                               │                    │
//!                               ▼                    ▼
//!                      ┌─────────────────────────────────────┐
//!                      │   ValueStore (produced > initial)   │
//!                      └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use strata_engine::{Dag, NodeDescriptor, value};
//! use tokio_util::sync::CancellationToken;
//!
//! let dag = Dag::new();
//! dag.seed_initial_value("x", value(20u32))?;
//! dag.register(
//!   "double",
//!   NodeDescriptor::new(|ctx| async move {
//!     let x: u32 = ctx.require_as("x")?;
//!     Ok::<_, BoxError>(value(x * 2))
//!   })
//!   .depends_on("x"),
//! )?;
//!
//! dag.plan()?;
//! dag.run(CancellationToken::new()).await?;
//! assert_eq!(dag.load_as::<u32>("double"), Some(40));
//! ```

mod dag;
mod error;
mod events;
mod executor;
mod result;
mod typed;

pub use dag::Dag;
pub use error::ExecutionError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use result::RunReport;
pub use typed::{downcast, type_key};

pub use strata_config::EngineConfig;
pub use strata_graph::{
  Behavior, BoxError, GraphError, Layer, Node, NodeContext, NodeDescriptor, Plan, Registry,
};
pub use strata_store::{StoreError, Value, ValueStore, value};
