//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a cluster node (connect, list_endpoints):
//!     → timeouts.rs (enforce connect/probe timeout)
//!     → On failure: counted by the backend's health state
//!
//! Periodic work (health checks):
//!     → backoff.rs (jittered sleep between checks)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call to a node has a deadline
//! - Jitter prevents thundering-herd health checks

pub mod backoff;
pub mod timeouts;
