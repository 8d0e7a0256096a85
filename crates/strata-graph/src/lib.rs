//! Strata Graph
//!
//! This crate holds the registration and planning half of strata:
//! - [`Node`] and [`NodeDescriptor`], the unit of work and how callers describe it
//! - [`Registry`], the thread-safe map from produced key to node
//! - [`plan`], which resolves dependencies into ordered [`Layer`]s
//!
//! Execution of a [`Plan`] lives in `strata-engine`.

mod error;
mod node;
mod planner;
mod registry;

pub use error::GraphError;
pub use node::{Behavior, BoxError, Node, NodeContext, NodeDescriptor};
pub use planner::{Layer, Plan, plan};
pub use registry::Registry;
