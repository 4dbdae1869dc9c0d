//! Shared helpers for the benchmark harness.

use basalt_events::Quote;

/// A representative quote for hot-path benchmarks: realistic field values,
/// nothing degenerate.
pub fn make_test_quote() -> Quote {
    Quote {
        bid_px: 4_512.25,
        ask_px: 4_512.5,
        ts_ns: 1_654_871_400_000_000_000,
        instrument_id: 1001,
        bid_sz: 12,
        ask_sz: 9,
    }
}
