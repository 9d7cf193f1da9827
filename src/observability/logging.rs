//! Structured logging.
//!
//! The router itself only emits `tracing` events; applications embedding it
//! decide where they go. [`init_logging`] is the stock setup: an
//! `EnvFilter` honouring `RUST_LOG`, falling back to the given directive,
//! and a fmt layer on stdout.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
