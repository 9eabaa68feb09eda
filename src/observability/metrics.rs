//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, outcome
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//! - `dispatch_failures_total` (counter): dispatch failures by kind
//! - `cache_lookups_total` (counter): lookups by class and result
//! - `cache_writes_total` (counter): persisted artifacts by class and result
//! - `cache_config_errors_total` (counter): unwritable cache directory hits
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!(
        "dispatch_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "dispatch_request_duration_seconds",
        "method" => method,
        "status" => status,
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch_failure(kind: &'static str) {
    counter!("dispatch_failures_total", "kind" => kind).increment(1);
}

pub fn record_cache_lookup(class: &'static str, result: &'static str) {
    counter!("cache_lookups_total", "class" => class, "result" => result).increment(1);
}

pub fn record_cache_write(class: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("cache_writes_total", "class" => class, "result" => result).increment(1);
}

pub fn record_cache_config_error() {
    counter!("cache_config_errors_total").increment(1);
}
