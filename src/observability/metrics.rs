//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cluster_relay_forwards_total` (counter): forwards by kind, status
//! - `cluster_relay_forward_duration_seconds` (histogram): time to response
//!   headers (HTTP) or to upgrade (WebSocket)
//! - `cluster_relay_websocket_relays_active` (gauge): live WebSocket relays

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::proxy::ForwardKind;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_forward(kind: ForwardKind, status: u16, started: Instant) {
    metrics::counter!(
        "cluster_relay_forwards_total",
        "kind" => kind.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "cluster_relay_forward_duration_seconds",
        "kind" => kind.as_str()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn relay_opened() {
    metrics::gauge!("cluster_relay_websocket_relays_active").increment(1.0);
}

pub fn relay_closed() {
    metrics::gauge!("cluster_relay_websocket_relays_active").decrement(1.0);
}
