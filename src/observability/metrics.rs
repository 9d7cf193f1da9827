//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_backend_transitions_total` (counter): backend up/down/closed by role
//! - `router_health_checks_total` (counter): health probes by outcome
//! - `router_bootstrap_total` (counter): bootstrap attempts by outcome
//! - `router_routes` (gauge): live backends, `kind` = healthy | leaders
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are low-cardinality (role, outcome), never addresses

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::cluster::endpoint::Role;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_backend_transition(role: Role, state: &'static str) {
    counter!("router_backend_transitions_total", "role" => role.name(), "state" => state).increment(1);
}

pub fn record_health_check(healthy: bool) {
    let outcome = if healthy { "ok" } else { "failed" };
    counter!("router_health_checks_total", "outcome" => outcome).increment(1);
}

pub fn record_bootstrap(outcome: &'static str) {
    counter!("router_bootstrap_total", "outcome" => outcome).increment(1);
}

pub fn record_routes(healthy: usize, leaders: usize) {
    gauge!("router_routes", "kind" => "healthy").set(healthy as f64);
    gauge!("router_routes", "kind" => "leaders").set(leaders as f64);
}
