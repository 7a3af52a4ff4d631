//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file.
    ///
    /// Loaders only parse; call [`Config::validate`] once every override
    /// has been applied.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config = Self::load_from_str(&content)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;

            tracing::info!("Configuration loaded successfully");
            Ok(config)
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn load_from_str(content: &str) -> Result<Config> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}

impl Config {
    /// Override fields from `FOUNDERLINK_*` variables looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = lookup("FOUNDERLINK_BIND_ADDR") {
            self.server.bind_addr = bind_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid FOUNDERLINK_BIND_ADDR: {}", bind_addr))?;
        }

        if let Some(log_level) = lookup("FOUNDERLINK_LOG_LEVEL") {
            self.monitoring.log_level = log_level;
        }

        if let Some(api_key) = lookup("FOUNDERLINK_API_KEY") {
            self.api.auth.api_key = Some(api_key);
        }

        if let Some(strict) = lookup("FOUNDERLINK_STRICT_ACCEPT") {
            self.graph.strict_accept = strict
                .parse::<bool>()
                .with_context(|| format!("Invalid FOUNDERLINK_STRICT_ACCEPT: {}", strict))?;
        }

        if let Some(timeout) = lookup("FOUNDERLINK_STORE_TIMEOUT") {
            self.graph.store_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid FOUNDERLINK_STORE_TIMEOUT: {}", timeout))?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .context("Server configuration validation failed")?;

        self.validate_api_config()
            .context("API configuration validation failed")?;

        self.validate_graph_config()
            .context("Graph configuration validation failed")?;

        self.validate_monitoring_config()
            .context("Monitoring configuration validation failed")?;

        self.validate_seed_users()
            .context("Seed user validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.shutdown_timeout.is_zero() {
            bail!("shutdown_timeout must be greater than 0");
        }
        Ok(())
    }

    fn validate_api_config(&self) -> Result<()> {
        let auth = &self.api.auth;
        let has_api_key = auth.api_key.as_deref().map_or(false, |key| !key.is_empty());

        if auth.enabled && !has_api_key && auth.basic_auth.is_none() {
            bail!("api.auth is enabled but neither api_key nor basic_auth is configured");
        }

        if let Some(basic) = &auth.basic_auth {
            if basic.username.is_empty() || basic.password.is_empty() {
                bail!("api.auth.basic_auth requires a username and a password");
            }
        }

        for origin in &self.api.cors_origins {
            if origin.is_empty() {
                bail!("api.cors_origins contains an empty origin");
            }
        }

        Ok(())
    }

    fn validate_graph_config(&self) -> Result<()> {
        if self.graph.store_timeout.is_zero() {
            bail!("store_timeout must be greater than 0");
        }

        if self.graph.store_timeout > Duration::from_secs(300) {
            bail!("store_timeout cannot exceed 5 minutes");
        }

        Ok(())
    }

    fn validate_monitoring_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.monitoring.log_level.as_str()) {
            bail!("monitoring.log_level must be one of: {}", valid_log_levels.join(", "));
        }
        Ok(())
    }

    fn validate_seed_users(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let mut emails = HashSet::new();

        for (i, user) in self.users.iter().enumerate() {
            if user.name.trim().is_empty() {
                bail!("User {} has empty name", i);
            }

            if user.email.trim().is_empty() {
                bail!("User {} has empty email", i);
            }

            if !emails.insert(user.email.to_ascii_lowercase()) {
                bail!("User {} email {} is duplicated", i, user.email);
            }

            if let Some(id) = user.id {
                if !ids.insert(id) {
                    bail!("User {} id {} is duplicated", i, id);
                }
            }
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<&str>,
        port: Option<u16>,
        no_auth: bool,
        strict_accept: bool,
    ) {
        if let Some(bind_str) = bind {
            if let Ok(addr) = bind_str.parse::<SocketAddr>() {
                self.server.bind_addr = addr;
                tracing::info!("CLI override: bind address set to {}", addr);
            } else {
                tracing::warn!("Invalid bind address provided: {}", bind_str);
            }
        }

        if let Some(port) = port {
            self.server.bind_addr.set_port(port);
            tracing::info!("CLI override: port set to {}", port);
        }

        if no_auth {
            self.api.auth.enabled = false;
            tracing::info!("CLI override: API authentication disabled");
        }

        if strict_accept {
            self.graph.strict_accept = true;
            tracing::info!("CLI override: strict accept enabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_requires_credential() {
        let mut config = Config::default();
        assert!(config.api.auth.enabled);
        assert!(config.validate().is_err());

        config.api.auth.api_key = Some("operator-key".to_string());
        assert!(config.validate().is_ok());

        config.api.auth.api_key = None;
        config.merge_with_cli_args(None, None, true, false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ConfigManager::load_from_str(
            r#"
            [graph]
            strict_accept = true
            store_timeout = "250ms"
            "#,
        )
        .unwrap();

        assert!(config.graph.strict_accept);
        assert_eq!(config.graph.store_timeout, Duration::from_millis(250));
        assert_eq!(config.server.bind_addr.port(), 5000);
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.api.auth.enabled = false;
        config.monitoring.log_level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_auth_without_credentials() {
        let mut config = Config::default();
        config.api.auth.enabled = true;
        config.api.auth.api_key = None;
        config.api.auth.basic_auth = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_seed_emails() {
        let result = ConfigManager::load_from_str(
            r#"
            [[users]]
            name = "Ada"
            email = "ada@example.com"

            [[users]]
            name = "Ada Again"
            email = "ADA@example.com"
            "#,
        )
        .unwrap();
        assert!(result.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FOUNDERLINK_BIND_ADDR", "0.0.0.0:8088"),
            ("FOUNDERLINK_STRICT_ACCEPT", "true"),
            ("FOUNDERLINK_STORE_TIMEOUT", "2s"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_addr.port(), 8088);
        assert!(config.graph.strict_accept);
        assert_eq!(config.graph.store_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_env_override_rejects_bad_bool() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|key| {
            (key == "FOUNDERLINK_STRICT_ACCEPT").then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_with_cli_args() {
        let mut config = Config::default();
        config.merge_with_cli_args(Some("0.0.0.0:7000"), Some(7001), true, true);

        assert_eq!(config.server.bind_addr, "0.0.0.0:7001".parse().unwrap());
        assert!(!config.api.auth.enabled);
        assert!(config.graph.strict_accept);
    }
}
