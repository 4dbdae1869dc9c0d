//! `basalt-feed`: the producer half of the pipeline.
//!
//! A [`RecordSource`] delivers a lazy sequence of historical market-data
//! records; the [`FeedHandler`] converts BBO records into [`Quote`]s and
//! pushes them onto the shared ring from a worker thread, counting receipts,
//! overruns, and per-push latency as it goes.
//!
//! The upstream SDK itself stays behind the [`RecordSource`] trait.
//! [`ReplaySource`] is the in-repo implementation: a deterministic
//! historical replay generator driven by the same fetch parameters a live
//! client would take.
//!
//! [`Quote`]: basalt_events::Quote

pub mod handler;
pub mod records;
pub mod replay;
pub mod source;

pub use handler::{ErrorSink, FeedHandler};
pub use records::{px_to_f64, BboRecord, BidAskLevel, OhlcvRecord, Record, RecordHeader};
pub use replay::ReplaySource;
pub use source::{FetchParams, Flow, RecordSource, SType, Schema, SourceError, SymbolMap};
