//! Algorithms shared between crates

pub mod stats;

pub use stats::{mean, median, StatsError};
