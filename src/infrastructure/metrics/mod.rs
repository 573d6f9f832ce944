//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active hub connections gauge
//! - Submissions by outcome (persisted, not_a_member, rejected, persistence_failed)
//! - Fan-out enqueue results by outcome (delivered, dropped)
//! - Persistence latency histogram

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Connections currently registered with the hub
pub static HUB_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("hub_connections_active", "Number of live hub connections").namespace("chat_hub"),
    )
    .expect("Failed to create HUB_CONNECTIONS_ACTIVE metric")
});

/// Submissions by outcome
pub static HUB_SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hub_submissions_total", "Message submissions by outcome").namespace("chat_hub"),
        &["outcome"],
    )
    .expect("Failed to create HUB_SUBMISSIONS_TOTAL metric")
});

/// Per-subscriber enqueue results
pub static HUB_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hub_deliveries_total", "Fan-out enqueue attempts by outcome")
            .namespace("chat_hub"),
        &["outcome"],
    )
    .expect("Failed to create HUB_DELIVERIES_TOTAL metric")
});

/// Message store latency
pub static HUB_PERSIST_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    Histogram::with_opts(
        HistogramOpts::new(
            "hub_persist_duration_seconds",
            "Message persistence latency in seconds",
        )
        .namespace("chat_hub")
        .buckets(buckets),
    )
    .expect("Failed to create HUB_PERSIST_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HUB_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register HUB_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(HUB_SUBMISSIONS_TOTAL.clone()))
        .expect("Failed to register HUB_SUBMISSIONS_TOTAL");
    registry
        .register(Box::new(HUB_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register HUB_DELIVERIES_TOTAL");
    registry
        .register(Box::new(HUB_PERSIST_DURATION_SECONDS.clone()))
        .expect("Failed to register HUB_PERSIST_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record the number of live connections
pub fn set_hub_connections(count: usize) {
    HUB_CONNECTIONS_ACTIVE.set(count as i64);
}

/// Record one submission outcome
pub fn record_submission(outcome: &str) {
    HUB_SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record fan-out results for one message
pub fn record_fan_out(delivered: usize, dropped: usize) {
    HUB_DELIVERIES_TOTAL
        .with_label_values(&["delivered"])
        .inc_by(delivered as u64);
    HUB_DELIVERIES_TOTAL
        .with_label_values(&["dropped"])
        .inc_by(dropped as u64);
}

/// Record how long the store took to persist a message
pub fn record_persist_duration(duration_secs: f64) {
    HUB_PERSIST_DURATION_SECONDS.observe(duration_secs);
}
