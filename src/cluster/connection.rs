//! Connection collaborators.
//!
//! The router never speaks the service's wire protocol itself. It asks a
//! [`ConnectionFactory`] for a live [`Connection`] and only ever calls the
//! topology query and `close` on it.

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cluster::endpoint::RawEndpoint;

/// Errors reported by connections and the factory.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The node could not be reached.
    #[error("connection to {addr} failed: {reason}")]
    Unreachable { addr: SocketAddr, reason: String },

    /// The call did not complete in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with an error.
    #[error("service error: {message}")]
    Service { message: String, auth: bool },

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}

impl ConnectionError {
    /// True for authentication failures, which retrying cannot fix.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ConnectionError::Service { auth: true, .. })
    }
}

/// A live client connection to one node.
#[async_trait]
pub trait Connection: Send + Sync + Debug {
    /// Ask the node for the current cluster topology.
    async fn list_endpoints(&self) -> Result<Vec<RawEndpoint>, ConnectionError>;

    /// Release the connection. Calling it twice is harmless.
    async fn close(&self);

    /// True once the underlying transport is gone for good.
    fn is_broken(&self) -> bool {
        false
    }
}

/// Shared handle to a connection; identity is pointer identity.
pub type SharedConnection = Arc<dyn Connection>;

/// Opens connections to cluster nodes.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    async fn connect(&self, addr: SocketAddr) -> Result<SharedConnection, ConnectionError>;
}

/// Compare two connection handles by identity.
pub fn same_connection(a: &SharedConnection, b: &SharedConnection) -> bool {
    Arc::ptr_eq(a, b)
}
