//! Metrics collection and exposition.
//!
//! # Metrics
//! - `beats_connections_total` (counter): connections accepted
//! - `beats_active_connections` (gauge): currently live connections
//! - `beats_events_total` (counter): events delivered to the sink
//! - `beats_batches_acked_total` (counter): batches acknowledged
//! - `beats_decode_errors_total` (counter): connections torn down on
//!   protocol errors
//!
//! # Design Decisions
//! - The `metrics` facade is recorded against unconditionally; without an
//!   installed exporter every update is a no-op
//! - The Prometheus exporter runs its own listener, off the ingest path

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Install the Prometheus exporter on the given address.
///
/// Failure to install is logged, not fatal: the server ingests fine without
/// an exporter.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!(address = %addr, "Metrics exporter listening"),
        Err(e) => error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
