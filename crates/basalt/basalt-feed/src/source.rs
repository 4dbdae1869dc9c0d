//! The contract between the producer and the upstream historical feed.
//!
//! A source is handed the fetch parameters plus two callbacks: the symbol
//! map callback fires exactly once before the first record, then the record
//! callback fires per record until the stream ends, fails, or the callback
//! asks to stop.

use crate::records::{rtype, Record};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upstream schema selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Bbo1S,
    Bbo1M,
}

impl Schema {
    /// The record-type discriminant records of this schema carry.
    pub fn rtype(self) -> u8 {
        match self {
            Schema::Bbo1S => rtype::BBO_1S,
            Schema::Bbo1M => rtype::BBO_1M,
        }
    }

    /// Bar interval of the subsampled feed, in seconds.
    pub fn interval_s(self) -> i64 {
        match self {
            Schema::Bbo1S => 1,
            Schema::Bbo1M => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Schema::Bbo1S => "bbo-1s",
            Schema::Bbo1M => "bbo-1m",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schema {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bbo-1s" => Ok(Schema::Bbo1S),
            "bbo-1m" => Ok(Schema::Bbo1M),
            other => Err(SourceError::UnsupportedSchema(other.to_string())),
        }
    }
}

/// Symbology type for the upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SType {
    RawSymbol,
    InstrumentId,
    Parent,
    Continuous,
}

/// Parameters of one historical fetch.
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub dataset: String,
    pub symbols: Vec<String>,
    /// Window bounds, ISO-8601 (`YYYY-MM-DDTHH:MM:SS`).
    pub start: String,
    pub end: String,
    pub schema: Schema,
    pub stype_in: SType,
    pub stype_out: SType,
    /// Record cap; `None` streams the whole window.
    pub limit: Option<u64>,
}

impl FetchParams {
    /// Builds params with the conventional symbology (parent symbols in,
    /// instrument ids out) and no record cap.
    pub fn new(
        dataset: impl Into<String>,
        symbols: Vec<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        schema: Schema,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            symbols,
            start: start.into(),
            end: end.into(),
            schema,
            stype_in: SType::Parent,
            stype_out: SType::InstrumentId,
            limit: None,
        }
    }
}

/// Instrument-id to symbol mapping, delivered once per stream before the
/// first record.
#[derive(Debug, Default, Clone)]
pub struct SymbolMap {
    entries: Vec<(u32, String)>,
}

impl SymbolMap {
    pub fn insert(&mut self, instrument_id: u32, symbol: impl Into<String>) {
        self.entries.push((instrument_id, symbol.into()));
    }

    pub fn resolve(&self, instrument_id: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| *id == instrument_id)
            .map(|(_, sym)| sym.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(id, sym)| (*id, sym.as_str()))
    }
}

/// Whether the source should keep delivering records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported schema: {0}")]
    UnsupportedSchema(String),

    #[error("upstream fetch failed: {0}")]
    Fetch(String),
}

/// A lazy sequence of historical records.
///
/// Implementations must call `on_symbol_map` exactly once before the first
/// `on_record`, honor a `Flow::Stop` return by ending the stream cleanly,
/// and report failures as `SourceError` values rather than panicking.
pub trait RecordSource {
    fn stream(
        &mut self,
        params: &FetchParams,
        on_symbol_map: &mut dyn FnMut(SymbolMap),
        on_record: &mut dyn FnMut(&Record) -> Flow,
    ) -> Result<(), SourceError>;
}
