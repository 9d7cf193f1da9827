//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cluster::connection::{same_connection, SharedConnection};
use crate::load_balancer::Selector;

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates, skipping the
/// previous connection when another one is available.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn select(
        &self,
        previous: Option<&SharedConnection>,
        candidates: &[SharedConnection],
    ) -> Option<SharedConnection> {
        if candidates.is_empty() {
            return None;
        }

        let len = candidates.len();
        let mut index = self.counter.fetch_add(1, Ordering::Relaxed) % len;
        if len > 1 && previous.is_some_and(|prev| same_connection(prev, &candidates[index])) {
            index = (index + 1) % len;
        }
        Some(candidates[index].clone())
    }
}
