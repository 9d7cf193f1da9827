//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Jittered timer per active backend
//!     → list_endpoints probe
//!     → Update the backend's error counter (state.rs)
//!     → Threshold crossed: backend down (+ rediscovery if it was the leader)
//!     → Leader reports itself: topology pushed back to the router
//!
//! State machine (state.rs):
//!     Pending → Active → Down, any → Closed
//! ```
//!
//! # Design Decisions
//! - One monitor per backend activation; it stops when the backend goes down
//! - Transient failures are absorbed until the threshold is reached
//! - Health state is per-backend, not per-role

pub mod active;
pub mod state;
