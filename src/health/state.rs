//! Backend health state machine.
//!
//! # States
//! - Pending: constructed, connection not open yet
//! - Active: connected and health-checked
//! - Down: connection closed after crossing the failure threshold
//! - Closed: retired for good
//!
//! # State Transitions
//! ```text
//! Pending → Active: connection opened
//! Active  → Down:   consecutive failures >= unhealthy_threshold
//! *       → Closed: endpoint removed or router shut down
//! ```
//!
//! # Design Decisions
//! - A single successful check clears earlier failures
//! - Counters reset when a connection is (re)opened

use std::sync::atomic::{AtomicU32, Ordering};

/// Lifecycle state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Pending,
    Active,
    Down,
    Closed,
}

impl std::fmt::Display for BackendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendState::Pending => "pending",
            BackendState::Active => "active",
            BackendState::Down => "down",
            BackendState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Consecutive health-check failure counter.
#[derive(Debug)]
pub struct ErrorCounter {
    count: AtomicU32,
    threshold: u32,
}

impl ErrorCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    /// Report a failed check. Returns the new consecutive failure count.
    pub fn record_failure(&self) -> u32 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// True once the failure count reaches the threshold.
    pub fn is_exhausted(&self) -> bool {
        self.count() >= self.threshold
    }

    /// True when at least one check failed since the last reset.
    pub fn is_suspect(&self) -> bool {
        self.count() > 0
    }
}
