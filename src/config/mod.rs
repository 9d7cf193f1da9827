//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → handed to EndpointRouter::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the router copies what it needs
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::HealthCheckConfig;
pub use schema::ObservabilityConfig;
pub use schema::RouterConfig;
pub use schema::RoutesConfig;
pub use schema::SeedConfig;
pub use schema::TimeoutConfig;
