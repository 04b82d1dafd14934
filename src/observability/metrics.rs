//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, circuit state, queue depth,
//!   cache traffic, webhook deliveries, dead-letter size)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): upstream requests by endpoint, outcome
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_queue_depth` (gauge): pending requests per endpoint
//! - `gateway_cache_lookups_total` (counter): by hit/miss
//! - `gateway_cache_entries` (gauge): live cache entries
//! - `gateway_webhook_deliveries_total` (counter): by event type, outcome
//! - `gateway_dead_letters` (gauge): retained dead-letter entries

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!("gateway_requests_total", "Upstream requests by endpoint and outcome");
    describe_histogram!("gateway_request_duration_seconds", "Upstream request latency");
    describe_gauge!("gateway_circuit_state", "Circuit state (0=closed, 1=open, 2=half-open)");
    describe_gauge!("gateway_queue_depth", "Pending requests per endpoint queue");
    describe_counter!("gateway_cache_lookups_total", "Cache lookups by result");
    describe_gauge!("gateway_cache_entries", "Live cache entries");
    describe_counter!("gateway_webhook_deliveries_total", "Webhook deliveries by event type and outcome");
    describe_gauge!("gateway_dead_letters", "Retained dead-letter entries");
}

/// Record one upstream request outcome with its latency.
pub fn record_request(endpoint: &str, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_circuit_state(endpoint: &str, state: CircuitState) {
    gauge!("gateway_circuit_state", "endpoint" => endpoint.to_string()).set(state.as_metric_value());
}

pub fn record_queue_depth(endpoint: &str, depth: usize) {
    gauge!("gateway_queue_depth", "endpoint" => endpoint.to_string()).set(depth as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("gateway_cache_entries").set(entries as f64);
}

pub fn record_webhook_delivery(event_type: &str, success: bool) {
    let outcome = if success { "delivered" } else { "dead_lettered" };
    counter!(
        "gateway_webhook_deliveries_total",
        "event_type" => event_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_dead_letter_size(entries: usize) {
    gauge!("gateway_dead_letters").set(entries as f64);
}
