//! API Server

use super::{handlers::AppState, router::Api};
use crate::config::ApiConfig;
use crate::Result;
use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// HTTP API server
pub struct ApiServer {
    bind_addr: SocketAddr,
    app_state: AppState,
    api_config: ApiConfig,
    expose_metrics: bool,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        bind_addr: SocketAddr,
        app_state: AppState,
        api_config: ApiConfig,
        expose_metrics: bool,
    ) -> Self {
        Self {
            bind_addr,
            app_state,
            api_config,
            expose_metrics,
        }
    }

    /// Serve until a shutdown signal arrives on `shutdown_rx`
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("Starting API server on {}", self.bind_addr);

        let app = self.router();

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", self.bind_addr))?;

        info!("API server listening on {}", self.bind_addr);

        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
            info!("API server received shutdown signal, draining requests");
        };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("API server error: {}", e);
            return Err(e.into());
        }

        info!("API server stopped");
        Ok(())
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        Api::create_router(self.app_state.clone(), &self.api_config, self.expose_metrics)
    }
}
