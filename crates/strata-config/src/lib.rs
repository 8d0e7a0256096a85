//! Strata Config
//!
//! This crate contains the serializable configuration types for strata:
//! - [`EngineConfig`], knobs for the execution engine
//! - [`GraphDef`] and [`NodeDef`], a declarative graph description used by
//!   the CLI to build and run a graph from a JSON file
//!
//! Graph definitions only describe shape and canned outputs. Nodes with real
//! behavior are registered in code through `strata-engine`.

mod engine;
mod error;
mod graph;

pub use engine::EngineConfig;
pub use error::ConfigError;
pub use graph::{GraphDef, NodeDef};
