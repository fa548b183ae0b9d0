use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tether_core::{Result, TetherConfig, TetherError};

use super::runtime::ServiceRuntime;

/// Runs services in the current process until shutdown.
pub struct Launcher {
    services: Vec<Arc<ServiceRuntime>>,
    config_entries: Vec<(String, String)>,
    shutdown: CancellationToken,
}

impl Launcher {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            config_entries: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Log this configuration, secrets masked, once `wait` begins.
    pub fn with_config(mut self, config: &TetherConfig) -> Self {
        self.config_entries = config.redacted_entries();
        self
    }

    /// Token that ends `wait` when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn services(&self) -> &[Arc<ServiceRuntime>] {
        &self.services
    }

    /// Start a service and keep it until shutdown.
    pub async fn launch(&mut self, service: Arc<ServiceRuntime>) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(TetherError::InvalidState(
                "Launcher is shutting down".to_string(),
            ));
        }
        if self.services.iter().any(|s| Arc::ptr_eq(s, &service)) {
            return Err(TetherError::InvalidState(format!(
                "Service '{}' was already launched",
                service.settings().topic
            )));
        }

        service.start().await?;
        self.services.push(service);
        Ok(())
    }

    /// Block until ctrl-c or the shutdown handle fires, then stop and wait
    /// for every service.
    pub async fn wait(&self) {
        if !self.config_entries.is_empty() {
            tracing::debug!("Full set of configuration options:");
            for (key, value) in &self.config_entries {
                tracing::debug!("{} = {}", key, value);
            }
        }

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => {
                    tracing::warn!("Failed to listen for shutdown signal: {}", e);
                    self.shutdown.cancelled().await;
                }
            },
            _ = self.shutdown.cancelled() => {
                tracing::info!("Received shutdown notification");
            }
        }

        self.stop().await;
        for service in &self.services {
            service.wait().await;
        }

        tracing::info!(services = self.services.len(), "All services stopped");
    }

    /// Stop every service without waiting for their timers.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        for service in &self.services {
            service.stop().await;
        }
    }
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}
