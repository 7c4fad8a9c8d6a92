//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): GraphQL requests by outcome
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_admission_rejections_total` (counter): rejections by error code
//! - `gateway_subgraph_requests_total` (counter): forwarded calls by subgraph, outcome
//! - `gateway_subgraph_reachable` (gauge): 1=reachable, 0=unreachable
//! - `gateway_requests_abandoned_total` (counter): requests dropped by client disconnect
//! - `gateway_rate_limiter_clients` (gauge): tracked rate limit windows
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it is a no-op
//! - Histogram buckets tuned for typical web latencies

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::ErrorCode;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Prometheus metrics exporter listening");
    Ok(())
}

pub fn record_request(outcome: &'static str, start: Instant) {
    metrics::counter!("gateway_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_admission_rejection(code: ErrorCode) {
    metrics::counter!("gateway_admission_rejections_total", "code" => code.as_str())
        .increment(1);
}

pub fn record_subgraph_request(subgraph: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_subgraph_requests_total",
        "subgraph" => subgraph.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_subgraph_reachable(subgraph: &str, reachable: bool) {
    metrics::gauge!("gateway_subgraph_reachable", "subgraph" => subgraph.to_string())
        .set(if reachable { 1.0 } else { 0.0 });
}

pub fn record_abandoned() {
    metrics::counter!("gateway_requests_abandoned_total").increment(1);
}

pub fn record_rate_limiter_clients(count: usize) {
    metrics::gauge!("gateway_rate_limiter_clients").set(count as f64);
}
