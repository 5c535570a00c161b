//! Metrics collection and exposition.
//!
//! # Metrics
//! - `storybook_calls_total` (counter): backend calls by kind, backend, outcome
//! - `storybook_retries_total` (counter): throttled calls retried on the same backend
//! - `storybook_exhausted_total` (counter): operations whose whole chain failed
//! - `storybook_rate_wait_seconds` (histogram): time blocked on a rate budget
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus endpoint is opt-in; the generator is a short-lived CLI

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(kind: &str, backend: &str, outcome: &str) {
    counter!(
        "storybook_calls_total",
        "kind" => kind.to_string(),
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_retry(kind: &str, backend: &str) {
    counter!(
        "storybook_retries_total",
        "kind" => kind.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_exhausted(kind: &str) {
    counter!("storybook_exhausted_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_rate_wait(budget: &str, waited: Duration) {
    histogram!("storybook_rate_wait_seconds", "budget" => budget.to_string())
        .record(waited.as_secs_f64());
}
