//! Threshold parsing and result classification.

mod classify;
mod range;

pub use classify::*;
pub use range::*;
