//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery:
//!     seeds → Resolver (shuffled addresses)
//!     → first reachable seed answers list_endpoints
//!     → router.rs update (reconcile: keep / move role / create / purge)
//!     → new backends connect in the background and join the pool
//!
//! Lookup:
//!     next_leader / next_any → pool snapshot under the lock → Selector
//!
//! Recovery:
//!     backend events (Down / Refresh / LeaderLost) → event loop
//!     → remove from pool / apply topology / bootstrap again
//! ```
//!
//! # Design Decisions
//! - One concrete router behind a small capability trait
//! - Bootstrap is the only recovery path for a lost leader; it is safe to
//!   run concurrently because identical updates are no-ops
//! - Lookups never error: no route is `None`

pub mod error;
pub mod router;

use std::time::Duration;

use async_trait::async_trait;

use crate::cluster::connection::SharedConnection;
use crate::cluster::endpoint::EndpointSet;

pub use error::{RouterError, RouterResult};
pub use router::EndpointRouter;

/// What callers need from a cluster router.
#[async_trait]
pub trait ClusterRouter: Send + Sync {
    async fn bootstrap(&self) -> RouterResult<()>;

    async fn update(&self, endpoints: EndpointSet);

    async fn wait_for_routes(
        &self,
        min_healthy: usize,
        min_leaders: usize,
        timeout: Duration,
    ) -> RouterResult<()>;

    fn next_leader(&self, previous: Option<&SharedConnection>) -> Option<SharedConnection>;

    fn next_any(&self, previous: Option<&SharedConnection>) -> Option<SharedConnection>;

    async fn close(&self);
}

#[async_trait]
impl ClusterRouter for EndpointRouter {
    async fn bootstrap(&self) -> RouterResult<()> {
        EndpointRouter::bootstrap(self).await
    }

    async fn update(&self, endpoints: EndpointSet) {
        EndpointRouter::update(self, endpoints).await
    }

    async fn wait_for_routes(
        &self,
        min_healthy: usize,
        min_leaders: usize,
        timeout: Duration,
    ) -> RouterResult<()> {
        EndpointRouter::wait_for_routes(self, min_healthy, min_leaders, timeout).await
    }

    fn next_leader(&self, previous: Option<&SharedConnection>) -> Option<SharedConnection> {
        EndpointRouter::next_leader(self, previous)
    }

    fn next_any(&self, previous: Option<&SharedConnection>) -> Option<SharedConnection> {
        EndpointRouter::next_any(self, previous)
    }

    async fn close(&self) {
        EndpointRouter::close(self).await
    }
}
