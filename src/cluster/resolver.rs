//! DNS resolution for seeds and hostname-only endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;

/// Resolves a hostname to candidate socket addresses.
///
/// Resolution failure is reported as an empty list so callers can fall
/// through to the next seed.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr>;
}

/// Resolver backed by the system's `getaddrinfo`, restricted to IPv4.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr> {
        match tokio::net::lookup_host((host, port)).await {
            Ok(addrs) => addrs.filter(SocketAddr::is_ipv4).collect(),
            Err(e) => {
                tracing::debug!(host = %host, port, error = %e, "DNS lookup failed");
                Vec::new()
            }
        }
    }
}

/// Fixed host table. Ports in the table are replaced by the requested port.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<SocketAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: impl Into<String>, addrs: Vec<SocketAddr>) {
        self.hosts.insert(host.into(), addrs);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr> {
        self.hosts
            .get(host)
            .map(|addrs| {
                addrs
                    .iter()
                    .map(|addr| SocketAddr::new(addr.ip(), port))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_resolver_keeps_ipv4_only() {
        let addrs = SystemResolver.resolve("127.0.0.1", 8111).await;
        assert_eq!(addrs, vec!["127.0.0.1:8111".parse::<SocketAddr>().unwrap()]);

        let addrs = SystemResolver.resolve("::1", 8111).await;
        assert!(addrs.is_empty());
    }

    #[tokio::test]
    async fn test_static_resolver_applies_requested_port() {
        let mut resolver = StaticResolver::new();
        resolver.insert("seed", vec!["10.1.1.1:1".parse().unwrap()]);

        let addrs = resolver.resolve("seed", 8111).await;
        assert_eq!(addrs, vec!["10.1.1.1:8111".parse::<SocketAddr>().unwrap()]);
        assert!(resolver.resolve("unknown", 8111).await.is_empty());
    }
}
