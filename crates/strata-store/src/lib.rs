//! Strata Store
//!
//! This crate provides the [`ValueStore`] that carries data between nodes.
//! It holds two tiers of values:
//! - the *initial* tier, seeded by the caller before (or between) runs
//! - the *produced* tier, written by the engine as nodes complete
//!
//! Reads consult the produced tier first and fall back to the initial tier.
//! Neither tier is cleared between runs.

mod error;
mod store;

pub use error::StoreError;
pub use store::{Value, ValueStore, value};
