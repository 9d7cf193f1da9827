//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router and backends produce:
//!     → tracing events (backend lifecycle, reconciliation, bootstrap)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (addr, role, error) rather than formatted strings
//! - [`init`] wires both from `[observability]`; the embedding application
//!   decides whether and when to call it

pub mod logging;
pub mod metrics;

use std::net::{AddrParseError, SocketAddr};

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::config::ObservabilityConfig;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid metrics address: {0}")]
    Address(#[from] AddrParseError),

    #[error("logging already initialised: {0}")]
    Logging(#[from] TryInitError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Install logging with `log_level` as the default filter, then the
/// Prometheus exporter when `metrics_enabled` is set.
///
/// The metrics address is parsed before anything global is installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let metrics_addr = if config.metrics_enabled {
        Some(config.metrics_address.parse::<SocketAddr>()?)
    } else {
        None
    };

    logging::init_logging(&config.log_level)?;
    if let Some(addr) = metrics_addr {
        metrics::init_metrics(addr)?;
    }
    Ok(())
}
