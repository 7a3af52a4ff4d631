//! Graceful Shutdown Handling
//!
//! Listens for SIGTERM and SIGINT, broadcasts the shutdown to subscribed
//! components and bounds how long they may take to drain.

use crate::Result;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Shutdown coordinator that manages graceful shutdown process
pub struct ShutdownCoordinator {
    /// Broadcast sender for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// How long a component may take to drain
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            timeout,
        }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Broadcast the shutdown signal to every subscriber
    pub fn trigger(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }
    }

    /// Wait for SIGTERM, SIGINT or Ctrl+C, then broadcast the shutdown
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        self.trigger();
        Ok(())
    }

    /// Wait for a task to finish draining, aborting it after the timeout.
    ///
    /// Returns whether the task finished in time.
    pub async fn drain(&self, name: &str, mut handle: JoinHandle<Result<()>>) -> bool {
        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => {
                info!("{} shut down cleanly", name);
                true
            }
            Ok(Ok(Err(e))) => {
                error!("{} exited with error: {}", name, e);
                true
            }
            Ok(Err(e)) => {
                if !e.is_cancelled() {
                    error!("{} task failed: {}", name, e);
                }
                true
            }
            Err(_) => {
                warn!("{} did not stop within {:?}, aborting", name, self.timeout);
                handle.abort();
                false
            }
        }
    }
}
