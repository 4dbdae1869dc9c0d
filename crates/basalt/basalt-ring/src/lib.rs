//! `basalt-ring`: bounded multi-producer multi-consumer queue for the
//! ingestion hot path.
//!
//! This crate provides the single synchronization primitive between the feed
//! producer and the aggregation consumers: a fixed-capacity lock-free FIFO
//! with per-slot sequence numbers (Vyukov's sequenced-slot scheme).
//!
//! # Core Components
//!
//! - [`MpmcRing`]: the bounded queue; `try_push`/`try_pop` never block
//! - [`RingConfig`]: capacity configuration (power of 2)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  try_push   ┌──────────────────────┐  try_pop   ┌──────────┐
//! │ Producer │ ──────────▶ │ slots[N] + sequences │ ─────────▶ │ Consumer │
//! │ (thread) │             │  head ···· tail      │            │ (thread) │
//! └──────────┘             └──────────────────────┘            └──────────┘
//! ```
//!
//! Full and empty are expected operating conditions, reported through the
//! boolean/`Option` results; callers count them as overruns and underruns.
//!
//! # Example
//!
//! ```
//! use basalt_ring::{MpmcRing, RingConfig};
//!
//! let ring: MpmcRing<u64> = MpmcRing::new(RingConfig::new(8));
//! assert!(ring.try_push(42));
//! assert_eq!(ring.try_pop(), Some(42));
//! assert_eq!(ring.try_pop(), None);
//! ```

mod mpmc;
mod ring;

pub use mpmc::MpmcRing;
pub use ring::RingConfig;
