//! `basalt-consumer`: the aggregation half of the pipeline.
//!
//! Drains quotes from the shared ring, folds each one into per-instrument
//! VWAP stats, and reports progress periodically. The stats map is owned by
//! the consumer thread; the ring is the only cross-thread structure.

pub mod consumer;
pub mod stats;

pub use consumer::Consumer;
pub use stats::{InstrumentStats, VwapTracker};
