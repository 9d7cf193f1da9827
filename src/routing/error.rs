//! Router error definitions.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::cluster::connection::ConnectionError;

/// Errors surfaced by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Bootstrap exhausted every seed and resolved address.
    #[error("no route: {0}")]
    NoRoute(String),

    /// `wait_for_routes` timed out before the thresholds were met.
    #[error(
        "not enough routes after {timeout:?}: expected {min_healthy}/{min_leaders}, \
         found {healthy}/{leaders} (healthy/leaders)"
    )]
    NotEnoughRoutes {
        timeout: Duration,
        min_healthy: usize,
        min_leaders: usize,
        healthy: usize,
        leaders: usize,
    },

    /// The service rejected our credentials. Never retried.
    #[error("authentication failed: {0}")]
    Auth(#[source] ConnectionError),

    /// A backend was asked to take an endpoint at another address.
    #[error("cannot move backend from {current} to {requested}")]
    AddressChanged {
        current: SocketAddr,
        requested: SocketAddr,
    },

    /// The router has been closed.
    #[error("router is closed")]
    Closed,
}

impl RouterError {
    /// True for the "no route available" class of failures.
    pub fn is_no_route(&self) -> bool {
        matches!(self, RouterError::NoRoute(_) | RouterError::NotEnoughRoutes { .. })
    }
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
