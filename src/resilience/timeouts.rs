//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap connection calls (connect, list_endpoints) with a deadline
//! - Fold the elapsed deadline into the connection error type
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout is an ordinary transient failure, never fatal

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::cluster::connection::ConnectionError;

/// Run a connection call, failing with [`ConnectionError::Timeout`] after `limit`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ConnectionError>
where
    F: Future<Output = Result<T, ConnectionError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::Timeout(limit)),
    }
}
