//! Transcript metrics aggregation.

pub mod aggregator;

pub use aggregator::*;
