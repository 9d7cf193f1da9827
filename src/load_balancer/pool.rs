//! Backend pool management.
//!
//! # Responsibilities
//! - Hold live backends grouped by role, then by address
//! - Move a backend between role buckets without touching its connection
//! - Snapshot connections for selection

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cluster::connection::SharedConnection;
use crate::cluster::endpoint::Role;
use crate::load_balancer::backend::Backend;

/// Live backends, bucketed by role then keyed by address.
#[derive(Debug, Default)]
pub struct BackendPool {
    buckets: HashMap<Role, HashMap<SocketAddr, Arc<Backend>>>,
}

impl BackendPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: Role, addr: SocketAddr) -> Option<&Arc<Backend>> {
        self.buckets.get(&role).and_then(|bucket| bucket.get(&addr))
    }

    /// Insert under `role`, returning whatever held that slot before.
    pub fn insert(&mut self, role: Role, backend: Arc<Backend>) -> Option<Arc<Backend>> {
        let addr = backend.addr_port();
        self.buckets.entry(role).or_default().insert(addr, backend)
    }

    /// Detach the backend at `addr` from any bucket other than `role`.
    pub fn take_from_other_role(&mut self, addr: SocketAddr, role: Role) -> Option<(Role, Arc<Backend>)> {
        self.buckets
            .iter_mut()
            .filter(|(bucket_role, _)| **bucket_role != role)
            .find_map(|(bucket_role, bucket)| bucket.remove(&addr).map(|b| (*bucket_role, b)))
    }

    /// Remove this exact backend, wherever it is. Returns true if found.
    pub fn remove(&mut self, backend: &Arc<Backend>) -> bool {
        for bucket in self.buckets.values_mut() {
            let key = bucket
                .iter()
                .find(|(_, b)| Arc::ptr_eq(b, backend))
                .map(|(addr, _)| *addr);
            if let Some(addr) = key {
                bucket.remove(&addr);
                return true;
            }
        }
        false
    }

    /// Remove every backend whose address is not in `keep`.
    pub fn remove_missing(&mut self, keep: &HashSet<SocketAddr>) -> Vec<Arc<Backend>> {
        let mut removed = Vec::new();
        for bucket in self.buckets.values_mut() {
            bucket.retain(|addr, backend| {
                let kept = keep.contains(addr);
                if !kept {
                    removed.push(backend.clone());
                }
                kept
            });
        }
        removed
    }

    pub fn all(&self) -> Vec<Arc<Backend>> {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.values())
            .cloned()
            .collect()
    }

    pub fn in_role(&self, role: Role) -> Vec<Arc<Backend>> {
        self.buckets
            .get(&role)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Live connections, for one role or for all.
    pub fn connections(&self, role: Option<Role>) -> Vec<SharedConnection> {
        let backends = match role {
            Some(role) => self.in_role(role),
            None => self.all(),
        };
        backends.iter().filter_map(|b| b.connection()).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, role: Role) -> usize {
        self.buckets.get(&role).map_or(0, HashMap::len)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
