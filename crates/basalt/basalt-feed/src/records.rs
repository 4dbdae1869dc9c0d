//! Upstream wire record shapes and the fixed-point price conversion.
//!
//! Field layout mirrors the upstream historical feed: a common header with a
//! record-type discriminant, nanosecond receive timestamps, and prices as
//! signed 64-bit fixed point at 1e-9 scale.

/// Record-type discriminants carried in [`RecordHeader::rtype`].
pub mod rtype {
    /// Best bid/offer subsampled at 1-second intervals.
    pub const BBO_1S: u8 = 0xC3;
    /// Best bid/offer subsampled at 1-minute intervals.
    pub const BBO_1M: u8 = 0xC4;
    /// 1-second OHLCV bar. Not consumed by this pipeline; present so the
    /// schema filter has something to ignore.
    pub const OHLCV_1S: u8 = 0x20;
}

/// Implicit divisor of fixed-point price fields.
pub const PRICE_SCALE: i64 = 1_000_000_000;

/// Sentinel for "no price on this side" (`i64::MAX`).
pub const UNDEF_PRICE: i64 = i64::MAX;

/// Converts an upstream fixed-point price to f64, mapping the undefined
/// sentinel to 0.0.
#[inline]
pub fn px_to_f64(fixed_px: i64) -> f64 {
    if fixed_px == UNDEF_PRICE {
        return 0.0;
    }
    fixed_px as f64 / PRICE_SCALE as f64
}

/// Common data for all upstream records.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record-type discriminant; see [`rtype`].
    pub rtype: u8,
    /// Publisher id assigned upstream.
    pub publisher_id: u16,
    /// Venue-assigned instrument id.
    pub instrument_id: u32,
    /// Matching-engine event timestamp, nanoseconds since the UNIX epoch.
    pub ts_event: u64,
}

/// One book level: top-of-book prices, sizes, and order counts.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BidAskLevel {
    pub bid_px: i64,
    pub ask_px: i64,
    pub bid_sz: u32,
    pub ask_sz: u32,
    pub bid_ct: u32,
    pub ask_ct: u32,
}

/// Subsampled best-bid/offer record (`rtype` BBO_1S or BBO_1M).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BboRecord {
    pub hd: RecordHeader,
    /// Capture-server receive timestamp, nanoseconds since the UNIX epoch.
    pub ts_recv: u64,
    pub levels: [BidAskLevel; 1],
}

/// OHLCV bar record. Carried through the source so consumers of the raw
/// stream see realistic interleaving; this pipeline filters it out.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OhlcvRecord {
    pub hd: RecordHeader,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: u64,
}

/// A record from the upstream stream, discriminated by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Record {
    Bbo(BboRecord),
    Ohlcv(OhlcvRecord),
}

impl Record {
    pub fn header(&self) -> &RecordHeader {
        match self {
            Record::Bbo(r) => &r.hd,
            Record::Ohlcv(r) => &r.hd,
        }
    }

    /// Downcast to a BBO record, if that is what this is.
    pub fn bbo(&self) -> Option<&BboRecord> {
        match self {
            Record::Bbo(r) => Some(r),
            Record::Ohlcv(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_fixed_point_prices() {
        assert_eq!(px_to_f64(1_000_000_000), 1.0);
        assert_eq!(px_to_f64(-500_000_000), -0.5);
        assert_eq!(px_to_f64(9_223_372_036_854_775_807), 0.0);
    }

    #[test]
    fn conversion_divides_by_scale_within_f64_precision() {
        for raw in [1i64, 250_000_000, 4_521_750_000_000, -3_141_592_653] {
            let expected = raw as f64 / 1e9;
            assert!((px_to_f64(raw) - expected).abs() <= f64::EPSILON * expected.abs());
        }
    }

    #[test]
    fn bbo_downcast_only_matches_bbo() {
        let hd = RecordHeader {
            rtype: rtype::BBO_1S,
            publisher_id: 1,
            instrument_id: 42,
            ts_event: 0,
        };
        let bbo = Record::Bbo(BboRecord {
            hd,
            ts_recv: 0,
            levels: [BidAskLevel {
                bid_px: 0,
                ask_px: 0,
                bid_sz: 0,
                ask_sz: 0,
                bid_ct: 0,
                ask_ct: 0,
            }],
        });
        assert!(bbo.bbo().is_some());

        let bar = Record::Ohlcv(OhlcvRecord {
            hd: RecordHeader {
                rtype: rtype::OHLCV_1S,
                ..hd
            },
            open: 0,
            high: 0,
            low: 0,
            close: 0,
            volume: 0,
        });
        assert!(bar.bbo().is_none());
        assert_eq!(bar.header().instrument_id, 42);
    }
}
