//! Ring drain loop: pop, aggregate, back off when empty, report on a timer.

use crate::stats::InstrumentStats;
use basalt_events::Quote;
use basalt_metrics::PipelineMetrics;
use basalt_ring::MpmcRing;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Sleep between polls of an empty ring.
const IDLE_BACKOFF: Duration = Duration::from_micros(100);

/// Cadence of the periodic status report.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub struct Consumer {
    ring: Arc<MpmcRing<Quote>>,
    metrics: Arc<PipelineMetrics>,
    stats: BTreeMap<i32, InstrumentStats>,
    /// Print one sample quote every N processed, `None` to disable.
    sample_every: Option<u64>,
    processed: u64,
}

impl Consumer {
    pub fn new(
        ring: Arc<MpmcRing<Quote>>,
        metrics: Arc<PipelineMetrics>,
        sample_every: Option<u64>,
    ) -> Self {
        Self {
            ring,
            metrics,
            stats: BTreeMap::new(),
            sample_every,
            processed: 0,
        }
    }

    /// Drains the ring until `running` is cleared and the ring is empty,
    /// then emits the final VWAP summary. Quotes still in flight when the
    /// flag drops are consumed before exit.
    pub fn run(&mut self, running: &AtomicBool) {
        let mut last_report = Instant::now();

        loop {
            match self.ring.try_pop() {
                Some(quote) => {
                    self.metrics.record_processed();
                    self.aggregate(&quote);
                }
                None => {
                    self.metrics.record_underrun();
                    if !running.load(Ordering::Acquire) {
                        // Stop requested and the ring is drained.
                        break;
                    }
                    std::thread::sleep(IDLE_BACKOFF);
                }
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                self.report_status();
                last_report = Instant::now();
            }
        }

        self.report_final();
    }

    fn aggregate(&mut self, quote: &Quote) {
        self.processed += 1;

        let mid = quote.mid_px();
        let qty = quote.pseudo_qty();
        self.stats
            .entry(quote.instrument_id)
            .or_default()
            .update(mid, qty);

        if let Some(every) = self.sample_every {
            if self.processed % every == 1 {
                // Copy out of the packed record before formatting.
                let Quote {
                    bid_px,
                    ask_px,
                    ts_ns,
                    instrument_id,
                    bid_sz,
                    ask_sz,
                } = *quote;
                info!(
                    n = self.processed,
                    instrument_id,
                    bid = format_args!("{bid_px} @ {bid_sz}"),
                    ask = format_args!("{ask_px} @ {ask_sz}"),
                    ts_ns,
                    "sample quote"
                );
            }
        }
    }

    fn report_status(&self) {
        info!(
            processed = self.metrics.processed(),
            ring_len = self.ring.len(),
            utilization = format_args!("{:.1}%", self.ring.utilization() * 100.0),
            received = self.metrics.received(),
            overruns = self.metrics.overruns(),
            avg_latency_us = format_args!("{:.3}", self.metrics.avg_latency_us()),
            push_success = format_args!("{:.2}%", self.metrics.push_success_rate() * 100.0),
            "consumer status"
        );
        for (instrument_id, stats) in &self.stats {
            info!(
                instrument_id,
                vwap = format_args!("{:.4}", stats.vwap.vwap()),
                trades = stats.trades,
                "instrument"
            );
        }
    }

    fn report_final(&self) {
        info!(processed = self.processed, "consumer exiting");
        for (instrument_id, stats) in &self.stats {
            info!(
                instrument_id,
                vwap = format_args!("{:.4}", stats.vwap.vwap()),
                trades = stats.trades,
                "final VWAP"
            );
        }
    }

    /// Per-instrument stats accumulated so far. Consumer-local; callers only
    /// see this after `run` returns.
    pub fn stats(&self) -> &BTreeMap<i32, InstrumentStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_ring::RingConfig;

    fn quote(id: i32, bid: f64, ask: f64, sz: u32) -> Quote {
        Quote {
            bid_px: bid,
            ask_px: ask,
            ts_ns: 0,
            instrument_id: id,
            bid_sz: sz,
            ask_sz: sz,
        }
    }

    #[test]
    fn drains_ring_then_stops_when_flag_cleared() {
        let ring = Arc::new(MpmcRing::new(RingConfig::new(16)));
        let metrics = Arc::new(PipelineMetrics::new());

        for i in 0..10 {
            assert!(ring.try_push(quote(1, 100.0 + i as f64, 101.0 + i as f64, 2)));
            metrics.record_received();
        }

        let mut consumer = Consumer::new(ring.clone(), metrics.clone(), None);
        let running = AtomicBool::new(false); // already stopped: drain and exit
        consumer.run(&running);

        assert!(ring.is_empty());
        assert_eq!(metrics.processed(), 10);
        assert_eq!(metrics.processed(), metrics.received());
        assert_eq!(consumer.stats()[&1].trades, 10);
    }

    #[test]
    fn aggregates_mid_price_and_mean_size_per_instrument() {
        let ring = Arc::new(MpmcRing::new(RingConfig::new(16)));
        let metrics = Arc::new(PipelineMetrics::new());
        let mut consumer = Consumer::new(ring.clone(), metrics, None);

        // mid 100.25, qty 4 and mid 200.5, qty 6 on two instruments.
        ring.try_push(quote(1, 100.0, 100.5, 4));
        ring.try_push(quote(2, 200.0, 201.0, 6));

        let running = AtomicBool::new(false);
        consumer.run(&running);

        let stats = consumer.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[&1].vwap.cum_qty, 4.0);
        assert_eq!(stats[&1].vwap.vwap(), 100.25);
        assert_eq!(stats[&2].vwap.cum_qty, 6.0);
        assert_eq!(stats[&2].vwap.vwap(), 200.5);
    }

    #[test]
    fn empty_polls_count_underruns() {
        let ring: Arc<MpmcRing<Quote>> = Arc::new(MpmcRing::new(RingConfig::new(4)));
        let metrics = Arc::new(PipelineMetrics::new());
        let mut consumer = Consumer::new(ring, metrics.clone(), None);

        let running = AtomicBool::new(false);
        consumer.run(&running);

        // The exit path itself is one failed pop.
        assert!(metrics.underruns() >= 1);
        assert_eq!(metrics.processed(), 0);
    }
}
