//! Prometheus metrics for queue backends.
//!
//! - Publish/consume throughput
//! - Buffered (pending) message depth
//! - Active consume streams
//! - Advisory events emitted by development-only backends

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "inproc_queue";

lazy_static! {
    /// Total messages published, by backend
    pub static ref QUEUE_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_published_total", METRIC_PREFIX),
        "Total messages published",
        &["backend"]
    ).unwrap();

    /// Total payloads handed to consumers, by backend
    pub static ref QUEUE_CONSUMED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_consumed_total", METRIC_PREFIX),
        "Total payloads delivered to consumers",
        &["backend"]
    ).unwrap();

    /// Messages in the process-wide buffer not yet delivered
    pub static ref QUEUE_PENDING: IntGauge = register_int_gauge!(
        format!("{}_pending", METRIC_PREFIX),
        "Messages in the process-wide buffer awaiting delivery"
    ).unwrap();

    /// Consume streams currently open
    pub static ref QUEUE_ACTIVE_CONSUMERS: IntGauge = register_int_gauge!(
        format!("{}_active_consumers", METRIC_PREFIX),
        "Number of open consume streams"
    ).unwrap();

    /// Advisory events emitted on backend construction
    pub static ref QUEUE_ADVISORIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_advisories_total", METRIC_PREFIX),
        "Total advisory warnings emitted by backends"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording per-backend throughput
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a successful publish
    pub fn record_published(backend: &str) {
        QUEUE_PUBLISHED_TOTAL.with_label_values(&[backend]).inc();
    }

    /// Record a payload handed to a consumer
    pub fn record_consumed(backend: &str) {
        QUEUE_CONSUMED_TOTAL.with_label_values(&[backend]).inc();
    }
}

/// Keeps `QUEUE_ACTIVE_CONSUMERS` in step with a stream's lifetime.
pub struct ConsumerGauge(());

impl ConsumerGauge {
    pub fn open() -> Self {
        QUEUE_ACTIVE_CONSUMERS.inc();
        Self(())
    }
}

impl Drop for ConsumerGauge {
    fn drop(&mut self) {
        QUEUE_ACTIVE_CONSUMERS.dec();
    }
}
