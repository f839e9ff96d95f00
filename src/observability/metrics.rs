//! Metrics collection and exposition.
//!
//! # Metrics
//! - `build_info` (gauge): always 1, labelled with build and description
//! - `lifecycle_transitions_total` (counter): coordinator transitions by phase
//! - `http_active_connections` (gauge): current connection count
//! - `http_connections_total` (counter): accepted connections
//! - `http_accept_errors_total` (counter): accept failures by kind
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::startup::BuildInfo;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_build_info(build: &BuildInfo) {
    ::metrics::gauge!(
        "build_info",
        "build" => build.build.to_string(),
        "desc" => build.desc.to_string()
    )
    .set(1.0);
}

pub fn record_transition(phase: &'static str) {
    ::metrics::counter!("lifecycle_transitions_total", "phase" => phase).increment(1);
}

pub fn record_connection_opened(active: u64) {
    ::metrics::counter!("http_connections_total").increment(1);
    ::metrics::gauge!("http_active_connections").set(active as f64);
}

pub fn record_connection_closed(active: u64) {
    ::metrics::gauge!("http_active_connections").set(active as f64);
}

pub fn record_accept_error(transient: bool) {
    let kind = if transient { "transient" } else { "listener" };
    ::metrics::counter!("http_accept_errors_total", "kind" => kind).increment(1);
}
