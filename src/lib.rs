//! Cluster routing and health-monitoring library.
//!
//! Discovers the nodes of a leader/replica cluster, keeps one health-checked
//! connection per node and hands callers a connection for "any node" or
//! "leader only" requests.

pub mod cluster;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use cluster::{
    Connection, ConnectionError, ConnectionFactory, EndpointSet, RawEndpoint, Resolver, Role,
    ServiceEndpoint, SharedConnection,
};
pub use config::schema::RouterConfig;
pub use routing::{ClusterRouter, EndpointRouter, RouterError, RouterResult};
