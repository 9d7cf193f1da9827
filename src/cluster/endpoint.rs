//! Cluster member descriptions.
//!
//! # Responsibilities
//! - Decode raw endpoint records reported by a node's topology query
//! - Fill in the missing half of (hostname, address), resolving DNS if needed
//! - Drop records that cannot be pinned to a concrete address

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cluster::resolver::Resolver;

/// Node role inside the replicated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Leader = 1,
    Replica = 2,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Leader => "LEADER",
            Role::Replica => "REPLICA",
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Role::Leader),
            2 => Ok(Role::Replica),
            other => Err(other),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An endpoint record as returned by `list_endpoints`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawEndpoint {
    #[serde(default)]
    pub address: Option<IpAddr>,
    #[serde(default)]
    pub hostname: Option<String>,
    pub port: u16,
    pub role: Role,
    #[serde(default)]
    pub leader_session_id: Option<u64>,
}

impl RawEndpoint {
    /// Record for a node known only by address.
    pub fn new(address: IpAddr, port: u16, role: Role) -> Self {
        Self {
            address: Some(address),
            hostname: None,
            port,
            role,
            leader_session_id: None,
        }
    }

    /// Record for a node known only by hostname.
    pub fn named(hostname: impl Into<String>, port: u16, role: Role) -> Self {
        Self {
            address: None,
            hostname: Some(hostname.into()),
            port,
            role,
            leader_session_id: None,
        }
    }
}

/// A resolved, immutable cluster member.
///
/// Two endpoints with the same [`addr_port`](Self::addr_port) describe the
/// same physical node, whatever their role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceEndpoint {
    pub address: IpAddr,
    pub port: u16,
    pub hostname: String,
    pub role: Role,
    pub leader_session_id: u64,
}

/// De-duplicated set of endpoints, ordered for stable logging.
pub type EndpointSet = BTreeSet<ServiceEndpoint>;

impl ServiceEndpoint {
    pub fn new(address: IpAddr, port: u16, role: Role) -> Self {
        Self {
            address,
            port,
            hostname: address.to_string(),
            role,
            leader_session_id: 0,
        }
    }

    /// Identity key of this node within a role bucket.
    pub fn addr_port(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// Build an endpoint from a raw record.
    ///
    /// Returns `None` when the record carries neither address nor hostname,
    /// or when the hostname does not resolve.
    pub async fn from_endpoint(raw: RawEndpoint, resolver: &dyn Resolver) -> Option<Self> {
        let (address, hostname) = match (raw.address, raw.hostname) {
            (Some(address), Some(hostname)) => (address, hostname),
            (Some(address), None) => (address, address.to_string()),
            (None, Some(hostname)) => {
                let resolved = resolver.resolve(&hostname, raw.port).await;
                let address = resolved.choose(&mut rand::thread_rng())?.ip();
                (address, hostname)
            }
            (None, None) => return None,
        };

        Some(Self {
            address,
            port: raw.port,
            hostname,
            role: raw.role,
            leader_session_id: raw.leader_session_id.unwrap_or(0),
        })
    }

    /// Build the set of usable endpoints from a raw list.
    pub async fn from_endpoints(raw: Vec<RawEndpoint>, resolver: &dyn Resolver) -> EndpointSet {
        let resolved = join_all(raw.into_iter().map(|ep| Self::from_endpoint(ep, resolver))).await;
        resolved.into_iter().flatten().collect()
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{} {})", self.role, self.hostname, self.port, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::resolver::StaticResolver;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_hostname_defaults_to_address() {
        let resolver = StaticResolver::default();
        let raw = RawEndpoint::new(ip("10.0.0.1"), 8111, Role::Leader);

        let ep = ServiceEndpoint::from_endpoint(raw, &resolver).await.unwrap();
        assert_eq!(ep.hostname, "10.0.0.1");
        assert_eq!(ep.leader_session_id, 0);
        assert_eq!(ep.addr_port(), "10.0.0.1:8111".parse().unwrap());
    }

    #[tokio::test]
    async fn test_hostname_is_resolved_when_address_missing() {
        let mut resolver = StaticResolver::default();
        resolver.insert("node-a.cluster", vec!["10.0.0.7:0".parse().unwrap()]);
        let raw = RawEndpoint::named("node-a.cluster", 8111, Role::Replica);

        let ep = ServiceEndpoint::from_endpoint(raw, &resolver).await.unwrap();
        assert_eq!(ep.address, ip("10.0.0.7"));
        assert_eq!(ep.port, 8111);
        assert_eq!(ep.hostname, "node-a.cluster");
    }

    #[tokio::test]
    async fn test_unresolvable_records_are_dropped() {
        let resolver = StaticResolver::default();
        let raw = vec![
            RawEndpoint::named("nowhere.cluster", 8111, Role::Replica),
            RawEndpoint {
                address: None,
                hostname: None,
                port: 8111,
                role: Role::Replica,
                leader_session_id: None,
            },
            RawEndpoint::new(ip("10.0.0.2"), 8111, Role::Replica),
            RawEndpoint::new(ip("10.0.0.2"), 8111, Role::Replica),
        ];

        let set = ServiceEndpoint::from_endpoints(raw, &resolver).await;
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().address, ip("10.0.0.2"));
    }

    #[test]
    fn test_role_codes() {
        assert_eq!(Role::try_from(1), Ok(Role::Leader));
        assert_eq!(Role::try_from(2), Ok(Role::Replica));
        assert_eq!(Role::try_from(9), Err(9));
        assert_eq!(Role::Leader.to_string(), "LEADER");
    }

    #[test]
    fn test_raw_endpoint_decodes_from_json() {
        let raw: RawEndpoint = serde_json::from_str(
            r#"{"address":"10.0.0.3","port":8111,"role":"LEADER","leader_session_id":7}"#,
        )
        .unwrap();
        assert_eq!(raw.role, Role::Leader);
        assert_eq!(raw.leader_session_id, Some(7));
        assert!(raw.hostname.is_none());
    }
}
