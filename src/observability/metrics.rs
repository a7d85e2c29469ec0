//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_relay_requests_total` (counter): relayed requests by method, status
//! - `proxy_relay_duration_seconds` (histogram): relay latency
//! - `proxy_tunnels_total` (counter): tunnels by outcome
//! - `proxy_tunnel_bytes_total` (counter): tunneled bytes by direction
//! - `proxy_pool_opens_total` (counter): pool opens by outcome
//! - `proxy_dispatches_total` (counter): pooled dispatch calls by outcome
//! - `proxy_dispatch_requests_total` (counter): individual dispatched requests

use std::net::SocketAddr;
use std::time::Instant;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Failure is logged, not fatal.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_relay(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_relay_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_tunnel(established: bool, client_to_target: u64, target_to_client: u64) {
    let outcome = if established { "established" } else { "failed" };
    counter!("proxy_tunnels_total", "outcome" => outcome).increment(1);
    if established {
        counter!("proxy_tunnel_bytes_total", "direction" => "client_to_target")
            .increment(client_to_target);
        counter!("proxy_tunnel_bytes_total", "direction" => "target_to_client")
            .increment(target_to_client);
    }
}

pub fn record_pool_open(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("proxy_pool_opens_total", "outcome" => outcome).increment(1);
}

pub fn record_dispatch(success: bool, requests: u64) {
    let outcome = if success { "success" } else { "failure" };
    counter!("proxy_dispatches_total", "outcome" => outcome).increment(1);
    counter!("proxy_dispatch_requests_total").increment(requests);
}
