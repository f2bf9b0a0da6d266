//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, latency, rejected connections, pool health)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `http_requests_total` (counter): responses by method, status
//! - `http_request_duration_seconds` (histogram): dispatch latency
//! - `http_connections_rejected_total` (counter): connections refused at the limit
//! - `pool_acquire_timeouts_total` (counter): `acquire()` calls that timed out
//! - `pool_connections_replaced_total` (counter): connections replaced after a failed probe
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one answered request.
pub fn record_request(method: &str, status: u16, start_time: Instant) {
    ::metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("http_request_duration_seconds")
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_rejected_connection() {
    ::metrics::counter!("http_connections_rejected_total").increment(1);
}

pub fn record_pool_timeout() {
    ::metrics::counter!("pool_acquire_timeouts_total").increment(1);
}

pub fn record_pool_replacement() {
    ::metrics::counter!("pool_connections_replaced_total").increment(1);
}
