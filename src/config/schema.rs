//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request framing limits.
    pub limits: LimitsConfig,

    /// Backing-store connection pool.
    pub pool: PoolSettings,

    /// Bearer-token authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Response identity.
    pub server: ServerSection,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Maximum concurrent connections. Excess connections get a 503.
    pub max_connections: usize,

    /// Listen backlog: pending, not-yet-accepted connections.
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 100,
            backlog: 128,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Close a connection after this long without receiving bytes.
    pub idle_secs: u64,

    /// How long shutdown waits for open connections to finish.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Request framing limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest header block accepted (request line + headers).
    pub max_header_bytes: usize,

    /// Largest `Content-Length` accepted.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Connections opened at startup.
    pub size: usize,

    /// Longest wait for a free connection, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: 10,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Tokens accepted at startup.
    pub tokens: Vec<String>,

    /// Paths (exact match) that skip authentication.
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tokens: vec!["test-token-123".to_string(), "admin-token-456".to_string()],
            public_paths: [
                "/api/auth/login",
                "/api/auth/register",
                "/api/health",
                "/api/space/list",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Server identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    /// Value of the `Server` response header.
    pub name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: "ParkingServer/1.0".to_string(),
        }
    }
}
