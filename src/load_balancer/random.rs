//! Random selection that steps away from the previous pick.

use rand::Rng;

use crate::cluster::connection::{same_connection, SharedConnection};
use crate::load_balancer::Selector;

/// Picks a uniformly random candidate; if that is the previous connection,
/// takes the next one instead (wrapping around).
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for RandomSelector {
    fn select(
        &self,
        previous: Option<&SharedConnection>,
        candidates: &[SharedConnection],
    ) -> Option<SharedConnection> {
        match candidates.len() {
            0 => None,
            // A single route is handed back even if it was just used.
            1 => Some(candidates[0].clone()),
            len => {
                let mut i = rand::thread_rng().gen_range(0..len);
                if previous.is_some_and(|prev| same_connection(prev, &candidates[i])) {
                    i = (i + 1) % len;
                }
                Some(candidates[i].clone())
            }
        }
    }
}
