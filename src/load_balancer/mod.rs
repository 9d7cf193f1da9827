//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! next_leader / next_any
//!     → pool.rs (snapshot live connections, leaders only or all)
//!     → Apply selection strategy:
//!         - random.rs (random pick, step off the previous connection)
//!         - round_robin.rs (rotate, step off the previous connection)
//!     → Return connection or None (no route)
//!
//! backend.rs: one live connection + health state per cluster node
//! ```
//!
//! # Design Decisions
//! - Selectors are pure over the snapshot; they never see the pool
//! - Only active backends are in the pool, so no health filtering here
//! - A single candidate is returned even if it was the previous pick

pub mod backend;
pub mod pool;
pub mod random;
pub mod round_robin;

use crate::cluster::connection::SharedConnection;

/// Chooses which connection to hand back to a caller.
pub trait Selector: Send + Sync + std::fmt::Debug {
    /// Pick one of `candidates`, avoiding `previous` when possible.
    fn select(
        &self,
        previous: Option<&SharedConnection>,
        candidates: &[SharedConnection],
    ) -> Option<SharedConnection>;
}

pub use backend::Backend;
pub use pool::BackendPool;
pub use random::RandomSelector;
pub use round_robin::RoundRobin;
