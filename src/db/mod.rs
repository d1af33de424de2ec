//! Counter store module.
//!
//! Persists the last raw counter observation between invocations so rate
//! checks can compute a per-second delta.

mod models;
mod store;

pub use models::*;
pub use store::*;
