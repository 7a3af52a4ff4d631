//! Founderlink - connection graph service
//!
//! Serves the user directory and the connection-request lifecycle over an
//! HTTP API backed by an in-memory user store.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use founderlink::{
    api::{ApiServer, AppState},
    config::ConfigManager,
    metrics::Metrics,
    store::MemoryUserStore,
    ShutdownCoordinator,
};

/// CLI arguments for Founderlink
#[derive(Parser, Debug)]
#[command(name = "founderlink")]
#[command(about = "Founderlink - connection graph service")]
#[command(version)]
#[command(long_about = "
Founderlink - connection graph service

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  FOUNDERLINK_BIND_ADDR      - Bind address (e.g., 127.0.0.1:5000)
  FOUNDERLINK_LOG_LEVEL      - Log level (trace, debug, info, warn, error)
  FOUNDERLINK_API_KEY        - API key required in the x-api-key header
  FOUNDERLINK_STRICT_ACCEPT  - Require a pending request to accept (true/false)
  FOUNDERLINK_STORE_TIMEOUT  - Upper bound on one store call (e.g., 5s)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", help = "Path to configuration file")]
    pub config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(short, long, help = "Bind address (e.g., 127.0.0.1:5000)")]
    pub bind: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(short, long, help = "Port to bind to")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Disable API authentication (overrides config file)
    #[arg(long, help = "Disable API authentication")]
    pub no_auth: bool,

    /// Require an existing pending request before accepting
    #[arg(long, help = "Require a pending request before accepting")]
    pub strict_accept: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    config.merge_with_cli_args(
        args.bind.as_deref(),
        args.port,
        args.no_auth,
        args.strict_accept,
    );
    if let Some(level) = &args.log_level {
        config.monitoring.log_level = level.clone();
    }

    config
        .validate()
        .context("Final configuration validation failed")?;

    init_tracing(&args, &config.monitoring.log_level)?;

    info!("Starting Founderlink v{}", env!("CARGO_PKG_VERSION"));

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Bind address: {}", config.server.bind_addr);
        info!(
            "  API authentication: {}",
            if config.api.auth.enabled { "enabled" } else { "disabled" }
        );
        info!(
            "  Accept mode: {}",
            if config.graph.strict_accept { "strict" } else { "permissive" }
        );
        info!("  Store timeout: {:?}", config.graph.store_timeout);
        info!("  Seed users: {}", config.users.len());
        return Ok(());
    }

    let store = Arc::new(
        MemoryUserStore::from_seed(&config.users)
            .await
            .context("Failed to seed user store")?,
    );
    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(store, &config.graph, metrics);

    let shutdown_coordinator = ShutdownCoordinator::new(config.server.shutdown_timeout);

    let server = ApiServer::new(
        config.server.bind_addr,
        state,
        config.api.clone(),
        config.monitoring.prometheus_enabled,
    );
    let server_handle = tokio::spawn(server.start(shutdown_coordinator.subscribe()));

    info!(
        "Founderlink started on {} ({} accept)",
        config.server.bind_addr,
        if config.graph.strict_accept { "strict" } else { "permissive" }
    );
    info!("Press Ctrl+C or send SIGTERM/SIGINT to shutdown gracefully");

    shutdown_coordinator.listen_for_signals().await?;

    info!("Initiating graceful shutdown...");
    shutdown_coordinator.drain("API server", server_handle).await;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs, configured_level: &str) -> Result<()> {
    let log_level = if args.verbose { "debug" } else { configured_level };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
