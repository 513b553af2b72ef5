//! Metrics collection and exposition.
//!
//! # Metrics
//! - `luaserve_requests_total` (counter): requests by method, status
//! - `luaserve_request_duration_seconds` (histogram): dispatch latency
//! - `luaserve_invocations_total` (counter): callback runs by outcome
//! - `luaserve_invocation_duration_seconds` (histogram): time waiting on the engine
//! - `luaserve_routes_registered` (gauge): routes registered by the script

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("luaserve_requests_total", &labels).increment(1);
    metrics::histogram!("luaserve_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of `ok`, `error`, `timeout`, `rejected`, `invalid`.
pub fn record_invocation(outcome: &'static str, start: Instant) {
    metrics::counter!("luaserve_invocations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("luaserve_invocation_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_routes_registered(count: usize) {
    metrics::gauge!("luaserve_routes_registered").set(count as f64);
}
