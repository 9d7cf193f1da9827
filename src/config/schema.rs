//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the cluster router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Discovery seeds, tried in order during bootstrap.
    pub seeds: Vec<SeedConfig>,

    /// Per-backend health check settings.
    pub health_check: HealthCheckConfig,

    /// Default thresholds for route waits.
    pub routes: RoutesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RouterConfig {
    /// Configuration with the given seeds and defaults elsewhere.
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<String>,
    {
        Self {
            seeds: seeds
                .into_iter()
                .map(|(host, port)| SeedConfig { host: host.into(), port })
                .collect(),
            ..Self::default()
        }
    }
}

/// A discovery seed: a hostname (or literal IP) and port.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SeedConfig {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for SeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Health check interval in milliseconds.
    pub interval_ms: u64,

    /// Extra random delay per check, as a fraction of the interval.
    pub jitter_ratio: f64,

    /// Timeout of a single `list_endpoints` probe in milliseconds.
    pub timeout_ms: u64,

    /// Number of consecutive failures before the backend is taken down.
    pub unhealthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            jitter_ratio: 0.1,
            timeout_ms: 2_500,
            unhealthy_threshold: 5,
        }
    }
}

/// Thresholds used by `wait_for_default_routes`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Minimum number of live backends of any role.
    pub min_healthy: usize,

    /// Minimum number of live leaders.
    pub min_leaders: usize,

    /// How long to wait for the thresholds in milliseconds.
    pub wait_timeout_ms: u64,
}

impl RoutesConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            min_healthy: 1,
            min_leaders: 1,
            wait_timeout_ms: 10_000,
        }
    }
}

/// Timeout configuration for connection handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Bounded wait for backend closes (purge and shutdown) in milliseconds.
    pub close_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn close(&self) -> Duration {
        Duration::from_millis(self.close_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_500,
            close_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
