//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pack_http_requests_total` (counter): requests by method, status
//! - `pack_http_request_duration_seconds` (histogram): latency distribution
//! - `pack_operations_total` (counter): pack outcomes by format, outcome
//! - `pack_log_records_dropped_total` (counter): records a sink failed to accept
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exporter is opt-in via configuration

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, latency: Duration) {
    metrics::counter!(
        "pack_http_requests_total",
        "method" => method.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "pack_http_request_duration_seconds",
        "method" => method.to_owned()
    )
    .record(latency.as_secs_f64());
}

pub fn record_pack(format: &str, outcome: &'static str) {
    metrics::counter!(
        "pack_operations_total",
        "format" => format.to_owned(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_dropped_log(sink: &'static str, count: u64) {
    metrics::counter!("pack_log_records_dropped_total", "sink" => sink).increment(count);
}
