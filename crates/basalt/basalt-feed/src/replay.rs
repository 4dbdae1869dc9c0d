//! Deterministic historical replay source.
//!
//! Stands in for the live upstream client behind [`RecordSource`]: it walks
//! the requested window at the schema's bar interval and synthesizes one BBO
//! record per symbol per bar, with an OHLCV bar sprinkled in so downstream
//! filtering is exercised. Output depends only on the fetch parameters, so
//! runs are reproducible.

use crate::records::{
    rtype, BboRecord, BidAskLevel, OhlcvRecord, Record, RecordHeader, PRICE_SCALE, UNDEF_PRICE,
};
use crate::source::{FetchParams, Flow, RecordSource, SourceError, SymbolMap};
use chrono::NaiveDateTime;
use tracing::debug;

/// Instrument ids are assigned densely starting here, in symbol order.
const BASE_INSTRUMENT_ID: u32 = 1000;

/// Synthetic capture delay between event and receive timestamps.
const WIRE_DELAY_NS: u64 = 250_000;

/// One OHLCV bar is interleaved every this many BBO bars.
const OHLCV_EVERY: i64 = 30;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct ReplaySource;

impl ReplaySource {
    /// The key is validated the way a live client builder would; the replay
    /// itself has no use for it.
    pub fn new(api_key: &str) -> Result<Self, SourceError> {
        if api_key.is_empty() {
            return Err(SourceError::Fetch("API key is empty".into()));
        }
        Ok(Self)
    }
}

fn parse_ts(raw: &str) -> Result<i64, SourceError> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| SourceError::Fetch(format!("bad timestamp '{raw}': {e}")))
}

/// Deterministic top-of-book for (symbol index, bar step). Prices walk a
/// small triangle wave around a per-symbol handle; one ask in every 97 bars
/// is undefined so the sentinel path stays exercised.
fn synth_level(idx: usize, step: i64) -> BidAskLevel {
    let base_px = (4_000 + 250 * idx as i64) * PRICE_SCALE;
    let tick = PRICE_SCALE / 4;
    let wiggle = ((step * 7 + idx as i64 * 3) % 40 - 20) * tick;

    let bid_px = base_px + wiggle;
    let ask_px = if (step + idx as i64) % 97 == 13 {
        UNDEF_PRICE
    } else {
        bid_px + tick
    };

    BidAskLevel {
        bid_px,
        ask_px,
        bid_sz: 10 + ((step + idx as i64) % 25) as u32,
        ask_sz: 10 + ((step * 3 + idx as i64) % 25) as u32,
        bid_ct: 1 + (step % 5) as u32,
        ask_ct: 1 + (step % 7) as u32,
    }
}

impl RecordSource for ReplaySource {
    fn stream(
        &mut self,
        params: &FetchParams,
        on_symbol_map: &mut dyn FnMut(SymbolMap),
        on_record: &mut dyn FnMut(&Record) -> Flow,
    ) -> Result<(), SourceError> {
        if params.symbols.is_empty() {
            return Err(SourceError::Fetch("no symbols requested".into()));
        }
        let start_s = parse_ts(&params.start)?;
        let end_s = parse_ts(&params.end)?;
        if end_s <= start_s {
            return Err(SourceError::Fetch(format!(
                "empty window: {} .. {}",
                params.start, params.end
            )));
        }

        let mut map = SymbolMap::default();
        for (idx, symbol) in params.symbols.iter().enumerate() {
            map.insert(BASE_INSTRUMENT_ID + idx as u32, symbol);
        }
        on_symbol_map(map);

        debug!(
            dataset = %params.dataset,
            schema = %params.schema,
            start = start_s,
            end = end_s,
            "replaying window"
        );

        let interval_s = params.schema.interval_s();
        let bbo_rtype = params.schema.rtype();
        let mut delivered = 0u64;
        let mut step = 0i64;

        let mut deliver = |record: Record| -> Flow {
            delivered += 1;
            if let Some(limit) = params.limit {
                if delivered > limit {
                    return Flow::Stop;
                }
            }
            on_record(&record)
        };

        let mut ts = start_s;
        while ts < end_s {
            let ts_event = ts as u64 * 1_000_000_000;

            // Interleave a bar record the pipeline is expected to ignore.
            if step % OHLCV_EVERY == 0 {
                let level = synth_level(0, step);
                let bar = Record::Ohlcv(OhlcvRecord {
                    hd: RecordHeader {
                        rtype: rtype::OHLCV_1S,
                        publisher_id: 1,
                        instrument_id: BASE_INSTRUMENT_ID,
                        ts_event,
                    },
                    open: level.bid_px,
                    high: level.bid_px + PRICE_SCALE,
                    low: level.bid_px - PRICE_SCALE,
                    close: level.bid_px,
                    volume: 100 + step as u64,
                });
                if deliver(bar) == Flow::Stop {
                    return Ok(());
                }
            }

            for (idx, _) in params.symbols.iter().enumerate() {
                let record = Record::Bbo(BboRecord {
                    hd: RecordHeader {
                        rtype: bbo_rtype,
                        publisher_id: 1,
                        instrument_id: BASE_INSTRUMENT_ID + idx as u32,
                        ts_event,
                    },
                    ts_recv: ts_event + WIRE_DELAY_NS,
                    levels: [synth_level(idx, step)],
                });
                if deliver(record) == Flow::Stop {
                    return Ok(());
                }
            }

            ts += interval_s;
            step += 1;
        }

        Ok(())
    }
}
