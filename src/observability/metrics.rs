//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_requests_total` (counter): requests by outcome (pass, rejected)
//! - `breaker_ticks_total` (counter): completed ticks by gate outcome
//! - `breaker_observed_rps` (gauge): request rate over the last tick
//! - `breaker_blocks_total` (counter): block writes by result (ok, error)
//! - `breaker_block_cache_cost` (gauge): cost held by the block cache
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed by [`init_metrics`].

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    counter!("breaker_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_tick(gate: &'static str, observed_rps: Option<f64>) {
    counter!("breaker_ticks_total", "gate" => gate).increment(1);
    if let Some(rps) = observed_rps {
        gauge!("breaker_observed_rps").set(rps);
    }
}

pub fn record_block(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("breaker_blocks_total", "result" => result).increment(1);
}

pub fn record_block_cache_cost(cost: i64) {
    gauge!("breaker_block_cache_cost").set(cost as f64);
}
