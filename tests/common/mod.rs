//! Shared utilities for integration and failure-injection testing.
//!
//! `MockCluster` is an in-memory cluster: it acts as both the connection
//! factory and the DNS resolver, and every node's behaviour can be flipped
//! while a router is running.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cluster_router::load_balancer::RandomSelector;
use cluster_router::{
    Connection, ConnectionError, ConnectionFactory, EndpointRouter, RawEndpoint, Resolver, Role,
    RouterConfig, SharedConnection,
};

#[derive(Debug, Clone)]
struct Node {
    reachable: bool,
    failing: bool,
    auth_error: bool,
    connect_delay: Duration,
    close_delay: Duration,
    endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Default)]
struct Shared {
    nodes: HashMap<SocketAddr, Node>,
    dns: HashMap<String, Vec<SocketAddr>>,
    resolves: HashMap<String, usize>,
    connects: HashMap<SocketAddr, usize>,
    closes: HashMap<SocketAddr, usize>,
}

/// Programmable in-memory cluster.
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    shared: Arc<Mutex<Shared>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        f(&mut self.shared.lock().unwrap())
    }

    /// Add a reachable node answering with `endpoints`.
    pub fn add_node(&self, addr: SocketAddr, endpoints: Vec<RawEndpoint>) {
        self.with(|s| {
            s.nodes.insert(
                addr,
                Node {
                    reachable: true,
                    failing: false,
                    auth_error: false,
                    connect_delay: Duration::ZERO,
                    close_delay: Duration::ZERO,
                    endpoints,
                },
            );
        });
    }

    pub fn add_host(&self, host: &str, addrs: Vec<SocketAddr>) {
        self.with(|s| {
            s.dns.insert(host.to_string(), addrs);
        });
    }

    /// Make every known node report `endpoints`.
    pub fn set_topology(&self, endpoints: Vec<RawEndpoint>) {
        self.with(|s| {
            for node in s.nodes.values_mut() {
                node.endpoints = endpoints.clone();
            }
        });
    }

    pub fn set_reachable(&self, addr: SocketAddr, reachable: bool) {
        self.with(|s| {
            if let Some(node) = s.nodes.get_mut(&addr) {
                node.reachable = reachable;
            }
        });
    }

    /// Make `list_endpoints` fail on this node.
    pub fn set_failing(&self, addr: SocketAddr, failing: bool) {
        self.with(|s| {
            if let Some(node) = s.nodes.get_mut(&addr) {
                node.failing = failing;
            }
        });
    }

    pub fn set_auth_error(&self, addr: SocketAddr, auth_error: bool) {
        self.with(|s| {
            if let Some(node) = s.nodes.get_mut(&addr) {
                node.auth_error = auth_error;
            }
        });
    }

    /// Hold each connect to this node for `delay` before answering.
    pub fn set_connect_delay(&self, addr: SocketAddr, delay: Duration) {
        self.with(|s| {
            if let Some(node) = s.nodes.get_mut(&addr) {
                node.connect_delay = delay;
            }
        });
    }

    /// Make `close` on this node's connections take `delay` to return.
    pub fn set_close_delay(&self, addr: SocketAddr, delay: Duration) {
        self.with(|s| {
            if let Some(node) = s.nodes.get_mut(&addr) {
                node.close_delay = delay;
            }
        });
    }

    pub fn resolve_count(&self, host: &str) -> usize {
        self.with(|s| s.resolves.get(host).copied().unwrap_or(0))
    }

    pub fn connect_count(&self, addr: SocketAddr) -> usize {
        self.with(|s| s.connects.get(&addr).copied().unwrap_or(0))
    }

    pub fn close_count(&self, addr: SocketAddr) -> usize {
        self.with(|s| s.closes.get(&addr).copied().unwrap_or(0))
    }

    fn list(&self, addr: SocketAddr) -> Result<Vec<RawEndpoint>, ConnectionError> {
        self.with(|s| match s.nodes.get(&addr) {
            Some(node) if node.auth_error => Err(ConnectionError::Service {
                message: "invalid credentials".into(),
                auth: true,
            }),
            Some(node) if node.failing || !node.reachable => Err(ConnectionError::Service {
                message: "node unavailable".into(),
                auth: false,
            }),
            Some(node) => Ok(node.endpoints.clone()),
            None => Err(ConnectionError::Closed),
        })
    }

    /// A router over this cluster with fast health checks.
    pub fn router(&self, seeds: &[(&str, u16)]) -> EndpointRouter {
        self.router_with_config(test_config(seeds))
    }

    /// A router whose health checks never fire during a test.
    pub fn quiet_router(&self, seeds: &[(&str, u16)]) -> EndpointRouter {
        let mut config = test_config(seeds);
        config.health_check.interval_ms = 60_000;
        self.router_with_config(config)
    }

    pub fn router_with_config(&self, config: RouterConfig) -> EndpointRouter {
        EndpointRouter::with_parts(
            config,
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Box::new(RandomSelector::new()),
        )
    }
}

#[async_trait]
impl ConnectionFactory for MockCluster {
    async fn connect(&self, addr: SocketAddr) -> Result<SharedConnection, ConnectionError> {
        let (reachable, delay) = self.with(|s| {
            *s.connects.entry(addr).or_default() += 1;
            s.nodes
                .get(&addr)
                .map_or((false, Duration::ZERO), |n| (n.reachable, n.connect_delay))
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !reachable {
            return Err(ConnectionError::Unreachable {
                addr,
                reason: "connection refused".into(),
            });
        }
        Ok(Arc::new(MockConnection {
            addr,
            cluster: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl Resolver for MockCluster {
    async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr> {
        self.with(|s| {
            *s.resolves.entry(host.to_string()).or_default() += 1;
            s.dns
                .get(host)
                .map(|addrs| addrs.iter().map(|a| SocketAddr::new(a.ip(), port)).collect())
                .unwrap_or_default()
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    addr: SocketAddr,
    cluster: MockCluster,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn list_endpoints(&self) -> Result<Vec<RawEndpoint>, ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        self.cluster.list(self.addr)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let delay = self.cluster.with(|s| {
            *s.closes.entry(self.addr).or_default() += 1;
            s.nodes.get(&self.addr).map_or(Duration::ZERO, |n| n.close_delay)
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub fn leader(addr: SocketAddr) -> RawEndpoint {
    RawEndpoint::new(addr.ip(), addr.port(), Role::Leader)
}

pub fn replica(addr: SocketAddr) -> RawEndpoint {
    RawEndpoint::new(addr.ip(), addr.port(), Role::Replica)
}

pub fn test_config(seeds: &[(&str, u16)]) -> RouterConfig {
    let mut config = RouterConfig::with_seeds(seeds.iter().map(|(h, p)| (*h, *p)));
    config.health_check.interval_ms = 20;
    config.health_check.jitter_ratio = 0.0;
    config.health_check.timeout_ms = 200;
    config.timeouts.connect_ms = 200;
    config.timeouts.close_ms = 1000;
    config
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
