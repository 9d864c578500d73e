//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_spam_blocked_total` (counter): rejections by signature
//! - `proxy_origin_errors_total` (counter): origin failures by kind
//! - `cache_purge_cycles_total` (counter): purge cycles by result
//! - `cache_storage_deletes_total` (counter): storage deletions by result
//! - `cache_purge_duration_seconds` (histogram): purge cycle wall time
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Exporter is optional; enabled by METRICS_ADDRESS

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::cache::PurgeOutcome;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_spam_blocked(signature: &'static str) {
    counter!("proxy_spam_blocked_total", "signature" => signature).increment(1);
}

pub fn record_origin_error(kind: &'static str) {
    counter!("proxy_origin_errors_total", "kind" => kind).increment(1);
}

pub fn record_purge_cycle(outcome: &PurgeOutcome) {
    let result = if outcome.is_complete() { "complete" } else { "partial" };
    counter!("cache_purge_cycles_total", "result" => result).increment(1);
    histogram!("cache_purge_duration_seconds").record(outcome.elapsed.as_secs_f64());

    if let Some(storage) = &outcome.storage {
        counter!("cache_storage_deletes_total", "result" => "success").increment(storage.succeeded as u64);
        counter!("cache_storage_deletes_total", "result" => "failure").increment(storage.failed as u64);
    }
}
