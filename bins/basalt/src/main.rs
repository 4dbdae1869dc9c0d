use basalt_config::BasaltConfig;
use basalt_consumer::Consumer;
use basalt_feed::{FeedHandler, FetchParams, ReplaySource, Schema};
use basalt_metrics::PipelineMetrics;
use basalt_ring::{MpmcRing, RingConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config/basalt/config.toml";

/// Grace period for the consumer to finish in-flight work after the
/// producer goes idle.
const DRAIN_WINDOW: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BasaltConfig::load_or_default(CONFIG_PATH)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    // Fatal startup checks: key present, schema supported, queue size sane
    // (the latter two validated inside parse/load).
    let api_key = basalt_config::api_key_from_env()?;
    let schema: Schema = config.schema.parse()?;

    info!(?config, "basalt starting");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            warn!("received shutdown signal");
            running.store(false, Ordering::Release);
        })?;
    }

    let ring = Arc::new(MpmcRing::new(RingConfig::new(config.queue_size)));
    let metrics = Arc::new(PipelineMetrics::new());

    let mut producer = FeedHandler::new(ring.clone(), metrics.clone());
    producer.set_error_sink(Arc::new(|message: &str| {
        error!(target: "basalt::feed", "{message}");
    }));

    let sample_every = config
        .enable_sample_output
        .then_some(config.sample_print_every);
    let mut consumer = Consumer::new(ring.clone(), metrics.clone(), sample_every);
    let consumer_thread = {
        let running = running.clone();
        std::thread::spawn(move || consumer.run(&running))
    };

    info!(
        dataset = %config.dataset,
        symbols = ?config.symbols,
        start = %config.start_time,
        end = %config.end_time,
        %schema,
        "fetching historical data"
    );
    let source = ReplaySource::new(&api_key)?;
    let params = FetchParams::new(
        &config.dataset,
        config.symbols.clone(),
        &config.start_time,
        &config.end_time,
        schema,
    );
    producer.start(source, params);

    // Poll at 1 Hz until the fetch finishes, the operator interrupts, or the
    // timeout elapses.
    let mut waited_s = 0u64;
    while producer.is_fetching() && running.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_secs(1));
        waited_s += 1;
        info!(
            elapsed_s = waited_s,
            ring_len = ring.len(),
            received = metrics.received(),
            "waiting for fetch"
        );
        if waited_s > config.fetch_timeout_seconds {
            warn!("timed out waiting for historical fetch");
            break;
        }
    }

    if !producer.is_fetching() {
        info!("fetch complete, draining consumer");
        let drain_deadline = Instant::now() + DRAIN_WINDOW;
        while !ring.is_empty() && Instant::now() < drain_deadline && running.load(Ordering::Acquire)
        {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    running.store(false, Ordering::Release);
    if consumer_thread.join().is_err() {
        warn!("consumer thread panicked");
    }
    producer.stop();

    // The final report always prints, even after an upstream fault, so the
    // operator sees how far the run got.
    info!(
        received = metrics.received(),
        processed = metrics.processed(),
        overruns = metrics.overruns(),
        underruns = metrics.underruns(),
        avg_latency_us = format_args!("{:.3}", metrics.avg_latency_us()),
        max_latency_ns = metrics.max_latency_ns(),
        push_success = format_args!("{:.2}%", metrics.push_success_rate() * 100.0),
        "final metrics"
    );

    info!("basalt run complete");
    Ok(())
}
