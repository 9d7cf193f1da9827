//! Cluster membership subsystem.
//!
//! # Data Flow
//! ```text
//! connection.list_endpoints()
//!     → RawEndpoint[] (address and/or hostname, port, role)
//!     → endpoint.rs (fill hostname/address, resolve DNS via resolver.rs)
//!     → EndpointSet (de-duplicated ServiceEndpoint values)
//! ```
//!
//! # Design Decisions
//! - Endpoints are immutable values; a role change is a new value
//! - Identity is (address, port), independent of role
//! - Collaborators (connection factory, resolver) are traits so the
//!   router never depends on a concrete transport

pub mod connection;
pub mod endpoint;
pub mod resolver;

pub use connection::{Connection, ConnectionError, ConnectionFactory, SharedConnection};
pub use endpoint::{EndpointSet, RawEndpoint, Role, ServiceEndpoint};
pub use resolver::{Resolver, StaticResolver, SystemResolver};
