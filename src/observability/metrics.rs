//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_requests_total` (counter): inbound requests by group, status
//! - `failover_request_duration_seconds` (histogram): end-to-end latency by group
//! - `failover_attempts_total` (counter): attempts by group, endpoint, outcome
//! - `failover_exhausted_total` (counter): dispatches where every endpoint failed
//! - `failover_cursor_index` (gauge): last succeeded endpoint per group

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one inbound request.
pub fn record_request(group: &str, status: u16, start: Instant) {
    metrics::counter!(
        "failover_requests_total",
        "group" => group.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("failover_request_duration_seconds", "group" => group.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record one endpoint attempt; `outcome` is `success`, `timeout`, `transport` or `status`.
pub fn record_attempt(group: &str, endpoint: &str, outcome: &'static str) {
    metrics::counter!(
        "failover_attempts_total",
        "group" => group.to_string(),
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_exhausted(group: &str) {
    metrics::counter!("failover_exhausted_total", "group" => group.to_string()).increment(1);
}

pub fn record_cursor(group: &str, index: usize) {
    metrics::gauge!("failover_cursor_index", "group" => group.to_string()).set(index as f64);
}
