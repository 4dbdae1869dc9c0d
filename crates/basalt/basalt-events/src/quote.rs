// Quote is the wire event of the pipeline: one best-bid/offer observation,
// POD and fixed-size, so it can be copied in and out of ring slots without
// serialization.
//
// Prices arrive from upstream as signed 64-bit fixed point (1e-9 scale) and
// are converted to f64 on ingress; an undefined side is carried as 0.0.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct Quote {
    pub bid_px: f64,
    pub ask_px: f64,
    /// Event timestamp in nanoseconds since the UNIX epoch (upstream `ts_recv`).
    pub ts_ns: i64,
    /// Dense numeric id assigned by the producer's symbol map.
    pub instrument_id: i32,
    pub bid_sz: u32,
    pub ask_sz: u32,
}

impl Quote {
    #[inline]
    pub fn mid_px(&self) -> f64 {
        (self.bid_px + self.ask_px) / 2.0
    }

    /// Pseudo-trade quantity for BBO aggregation: mean of the two top-of-book
    /// sizes, integer-truncated before widening.
    #[inline]
    pub fn pseudo_qty(&self) -> f64 {
        ((self.bid_sz as u64 + self.ask_sz as u64) / 2) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    /// The ring copies quotes by value on every push and pop, so the record
    /// must stay dense: 36 bytes packed, no padding. A slot holding a Quote
    /// plus its sequence word then fits in a single 64-byte cache line.
    #[test]
    fn quote_is_dense_pod() {
        assert_eq!(size_of::<Quote>(), 36, "Quote layout changed");
        assert_eq!(align_of::<Quote>(), 1, "Quote should be packed");
    }

    #[test]
    fn mid_px_is_average_of_sides() {
        let q = Quote {
            bid_px: 100.0,
            ask_px: 100.5,
            ..Quote::default()
        };
        assert_eq!(q.mid_px(), 100.25);
    }

    #[test]
    fn pseudo_qty_truncates_like_integer_division() {
        let q = Quote {
            bid_sz: 3,
            ask_sz: 4,
            ..Quote::default()
        };
        assert_eq!(q.pseudo_qty(), 3.0);
    }
}
