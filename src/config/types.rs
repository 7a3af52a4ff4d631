//! Configuration Types

use crate::api::types::ApiAuthConfig;
use crate::store::UserId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub graph: GraphConfig,
    pub monitoring: MonitoringConfig,
    pub users: Vec<SeedUserConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// HTTP API configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub auth: ApiAuthConfig,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

/// Connection graph behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Require a pending request before an accept creates a connection
    pub strict_accept: bool,
    /// Upper bound on a single store call
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub prometheus_enabled: bool,
}

/// User profile seeded into the store at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedUserConfig {
    #[serde(default)]
    pub id: Option<UserId>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strict_accept: false,
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            prometheus_enabled: true,
        }
    }
}
