//! Full-history recalculation.

pub mod engine;

pub use engine::{Replayer, ReplaySummary};
