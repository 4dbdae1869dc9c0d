//! Wait-free counters for pipeline monitoring.
//!
//! All updates are relaxed `fetch_add`s and all reads are relaxed loads; the
//! counters observe the pipeline, they never synchronize it. The one
//! exception is the maximum-latency watermark, which uses a CAS loop so
//! concurrent producers cannot regress it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter bundle shared between the feed producer and the consumers.
///
/// Producer-written counters (`messages_received`, the latency pair,
/// `buffer_overruns`) live on the first cache line and consumer-written
/// counters on the second, so the two sides never false-share.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    messages_received: AtomicU64,
    total_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
    buffer_overruns: AtomicU64,
    _pad: [u8; 32],
    messages_processed: AtomicU64,
    buffer_underruns: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer-side push success.
    #[inline]
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Consumer-side pop success.
    #[inline]
    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds one push latency sample and raises the maximum watermark if the
    /// sample exceeds it. The watermark CAS retries only while other threads
    /// are publishing strictly larger values, so it never decreases.
    #[inline]
    pub fn record_latency(&self, latency_ns: u64) {
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);

        let mut current = self.max_latency_ns.load(Ordering::Relaxed);
        while current < latency_ns {
            match self.max_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Failed push (ring full). Returns the running overrun total so the
    /// caller can throttle its reporting without a second load.
    #[inline]
    pub fn record_overrun(&self) -> u64 {
        self.buffer_overruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Failed pop (ring empty).
    #[inline]
    pub fn record_underrun(&self) {
        self.buffer_underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    pub fn total_latency_ns(&self) -> u64 {
        self.total_latency_ns.load(Ordering::Relaxed)
    }

    pub fn max_latency_ns(&self) -> u64 {
        self.max_latency_ns.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.buffer_overruns.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.buffer_underruns.load(Ordering::Relaxed)
    }

    /// Mean push latency over processed messages, in nanoseconds.
    pub fn avg_latency_ns(&self) -> f64 {
        self.total_latency_ns() as f64 / self.processed().max(1) as f64
    }

    /// Convenience for reports, which quote latency in microseconds.
    pub fn avg_latency_us(&self) -> f64 {
        self.avg_latency_ns() / 1_000.0
    }

    /// Fraction of push attempts that landed: `1 − overruns / attempts`.
    pub fn push_success_rate(&self) -> f64 {
        let attempts = self.received() + self.overruns();
        1.0 - self.overruns() as f64 / attempts.max(1) as f64
    }

    /// Zeroes every counter. Only call while both producer and consumer are
    /// quiescent; there is no synchronization against in-flight updates.
    pub fn reset(&self) {
        self.messages_received.store(0, Ordering::Relaxed);
        self.messages_processed.store(0, Ordering::Relaxed);
        self.total_latency_ns.store(0, Ordering::Relaxed);
        self.max_latency_ns.store(0, Ordering::Relaxed);
        self.buffer_overruns.store(0, Ordering::Relaxed);
        self.buffer_underruns.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counter_groups_sit_on_separate_cache_lines() {
        use std::mem::{align_of, size_of};
        assert_eq!(align_of::<PipelineMetrics>(), 64);
        assert_eq!(size_of::<PipelineMetrics>(), 128);
    }

    /// No lost updates: K threads each recording M receipts must sum to K·M.
    #[test]
    fn concurrent_updates_are_not_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 10_000;

        let metrics = Arc::new(PipelineMetrics::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        metrics.record_received();
                        metrics.record_latency(10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.received(), THREADS * PER_THREAD);
        assert_eq!(metrics.total_latency_ns(), THREADS * PER_THREAD * 10);
    }

    /// The watermark keeps the largest sample regardless of arrival order.
    #[test]
    fn max_latency_never_decreases() {
        let metrics = Arc::new(PipelineMetrics::new());

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for i in 0..1_000 {
                        metrics.record_latency(t * 1_000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.max_latency_ns(), 3_999);

        // A smaller late sample must not regress the watermark.
        metrics.record_latency(5);
        assert_eq!(metrics.max_latency_ns(), 3_999);
    }

    #[test]
    fn avg_latency_divides_by_processed() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.avg_latency_ns(), 0.0);

        metrics.record_latency(300);
        metrics.record_processed();
        metrics.record_processed();
        metrics.record_processed();
        assert_eq!(metrics.avg_latency_ns(), 100.0);
        assert_eq!(metrics.avg_latency_us(), 0.1);
    }

    #[test]
    fn push_success_rate_counts_overruns_against_attempts() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.push_success_rate(), 1.0);

        for _ in 0..9 {
            metrics.record_received();
        }
        assert_eq!(metrics.record_overrun(), 1);
        assert_eq!(metrics.push_success_rate(), 0.9);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = PipelineMetrics::new();
        metrics.record_received();
        metrics.record_processed();
        metrics.record_latency(42);
        metrics.record_overrun();
        metrics.record_underrun();

        metrics.reset();
        assert_eq!(metrics.received(), 0);
        assert_eq!(metrics.processed(), 0);
        assert_eq!(metrics.total_latency_ns(), 0);
        assert_eq!(metrics.max_latency_ns(), 0);
        assert_eq!(metrics.overruns(), 0);
        assert_eq!(metrics.underruns(), 0);
    }
}
