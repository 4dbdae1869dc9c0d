//! Feed producer: drives a [`RecordSource`] on a worker thread and pushes
//! converted quotes onto the shared ring.
//!
//! Lifecycle is Idle → Running → (Stopping) → Idle. `start` spawns the
//! worker and raises the fetching flag; the worker lowers it when the stream
//! ends or fails; `stop` lowers it and joins. Upstream failures never
//! propagate past the worker: they are stringified into the error sink and
//! leave partial progress visible in the metrics.

use crate::records::{px_to_f64, BboRecord, Record};
use crate::source::{FetchParams, Flow, RecordSource, SymbolMap};
use basalt_events::Quote;
use basalt_metrics::PipelineMetrics;
use basalt_ring::MpmcRing;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{info, trace};

/// Callback for recoverable producer errors and throttled overflow notices.
/// Install once, before the first `start`; it is not synchronized against a
/// running worker.
pub type ErrorSink = Arc<dyn Fn(&str) + Send + Sync>;

/// One overflow notice per this many consecutive overruns.
const OVERRUN_REPORT_EVERY: u64 = 1_000;

pub struct FeedHandler {
    ring: Arc<MpmcRing<Quote>>,
    metrics: Arc<PipelineMetrics>,
    fetching: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    error_sink: Option<ErrorSink>,
}

/// Everything the worker needs, detached from `&self` so the thread owns it.
struct WorkerCtx {
    ring: Arc<MpmcRing<Quote>>,
    metrics: Arc<PipelineMetrics>,
    fetching: Arc<AtomicBool>,
    error_sink: Option<ErrorSink>,
}

impl WorkerCtx {
    fn report_error(&self, message: &str) {
        match &self.error_sink {
            Some(sink) => sink(message),
            None => tracing::error!("{message}"),
        }
    }

    /// Pushes one quote, bracketing the attempt with a steady-clock read for
    /// the latency counters. Overflow is counted and surfaced at a throttled
    /// cadence, never treated as an error.
    fn push_quote(&self, quote: Quote) {
        let started = Instant::now();
        if self.ring.try_push(quote) {
            let latency_ns = started.elapsed().as_nanos() as u64;
            self.metrics.record_received();
            self.metrics.record_latency(latency_ns);
        } else {
            let overruns = self.metrics.record_overrun();
            if overruns % OVERRUN_REPORT_EVERY == 1 {
                self.report_error(&format!(
                    "ring overrun (total {overruns}), utilization {:.1}%",
                    self.ring.utilization() * 100.0
                ));
            }
        }
    }
}

fn quote_from_bbo(bbo: &BboRecord) -> Quote {
    let level = bbo.levels[0];
    Quote {
        bid_px: px_to_f64(level.bid_px),
        ask_px: px_to_f64(level.ask_px),
        ts_ns: bbo.ts_recv as i64,
        instrument_id: bbo.hd.instrument_id as i32,
        bid_sz: level.bid_sz,
        ask_sz: level.ask_sz,
    }
}

/// Worker body, shared by the background and blocking entry points.
/// Returns whether the stream completed without an upstream error.
fn run_fetch<S: RecordSource>(mut source: S, params: FetchParams, ctx: WorkerCtx) -> bool {
    // A fresh fetch starts from clean counters; both sides are quiescent
    // here because the consumer only reads and the previous worker is gone.
    ctx.metrics.reset();
    info!(
        dataset = %params.dataset,
        schema = %params.schema,
        start = %params.start,
        end = %params.end,
        "historical fetch starting"
    );

    let want_rtype = params.schema.rtype();
    let mut symbol_map = SymbolMap::default();

    let result = {
        let on_map = &mut |map: SymbolMap| {
            info!(instruments = map.len(), "symbol map received");
            symbol_map = map;
        };
        let on_record = &mut |record: &Record| {
            if !ctx.fetching.load(Ordering::Acquire) {
                return Flow::Stop;
            }
            match record.bbo() {
                Some(bbo) if bbo.hd.rtype == want_rtype => {
                    ctx.push_quote(quote_from_bbo(bbo));
                }
                _ => {
                    trace!(
                        rtype = record.header().rtype,
                        instrument_id = record.header().instrument_id,
                        "skipping record of unrequested kind"
                    );
                }
            }
            Flow::Continue
        };
        source.stream(&params, on_map, on_record)
    };

    let ok = match result {
        Ok(()) => {
            info!(
                received = ctx.metrics.received(),
                overruns = ctx.metrics.overruns(),
                instruments = symbol_map.len(),
                "historical fetch complete"
            );
            true
        }
        Err(e) => {
            ctx.report_error(&format!("historical fetch failed: {e}"));
            false
        }
    };

    ctx.fetching.store(false, Ordering::Release);
    ok
}

impl FeedHandler {
    pub fn new(ring: Arc<MpmcRing<Quote>>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            ring,
            metrics,
            fetching: Arc::new(AtomicBool::new(false)),
            worker: None,
            error_sink: None,
        }
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.error_sink = Some(sink);
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    fn worker_ctx(&self) -> WorkerCtx {
        WorkerCtx {
            ring: self.ring.clone(),
            metrics: self.metrics.clone(),
            fetching: self.fetching.clone(),
            error_sink: self.error_sink.clone(),
        }
    }

    /// Starts a background fetch. A second call while one is running is a
    /// no-op reported through the error sink.
    pub fn start<S>(&mut self, source: S, params: FetchParams)
    where
        S: RecordSource + Send + 'static,
    {
        if self.fetching.swap(true, Ordering::AcqRel) {
            self.worker_ctx().report_error("already fetching");
            return;
        }
        // Reap a worker from a previous, already-finished run.
        if let Some(old) = self.worker.take() {
            let _ = old.join();
        }

        let ctx = self.worker_ctx();
        self.worker = Some(std::thread::spawn(move || {
            run_fetch(source, params, ctx);
        }));
    }

    /// Runs the fetch on the caller's thread. Returns `false` if the stream
    /// failed or a fetch was already running.
    pub fn fetch<S: RecordSource>(&mut self, source: S, params: FetchParams) -> bool {
        if self.fetching.swap(true, Ordering::AcqRel) {
            self.worker_ctx().report_error("already fetching");
            return false;
        }
        run_fetch(source, params, self.worker_ctx())
    }

    /// Asks a running worker to stop at the next record and joins it.
    /// Idempotent.
    pub fn stop(&mut self) {
        self.fetching.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FeedHandler {
    fn drop(&mut self) {
        self.stop();
    }
}
