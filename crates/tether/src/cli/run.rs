use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tether_core::config::{LogFormat, ObservabilityConfig, TetherConfig};
use tether_core::{DirectoryStore, Manager};
use tether_runtime::directory::{MemoryDirectory, PgDirectory};
use tether_runtime::endpoint::HttpTransport;
use tether_runtime::service::{Launcher, ManagerRegistry, ServiceBuilder};

use tether::StatusManager;

/// Manager used when the configuration names none.
const DEFAULT_MANAGER: &str = "status";

/// Run a service until interrupted.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "tether.toml")]
    pub config: String,

    /// Binary name to register under (defaults to the executable name).
    #[arg(long)]
    pub binary: Option<String>,

    /// Topic to serve (defaults to the binary name).
    #[arg(long)]
    pub topic: Option<String>,

    /// Host name to register under (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Registered manager to run (overrides config).
    #[arg(long)]
    pub manager: Option<String>,

    /// Enable development mode (verbose logging).
    #[arg(long)]
    pub dev: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;
        init_tracing(&config.observability, self.dev);

        info!("Loaded configuration from {}", self.config);

        let directory: Arc<dyn DirectoryStore> = match &config.database.url {
            Some(_) => {
                let directory = PgDirectory::connect(&config.database).await?;
                directory.migrate().await?;
                info!("Using database directory");
                Arc::new(directory)
            }
            None => {
                info!("No database configured, using in-memory directory");
                Arc::new(MemoryDirectory::new())
            }
        };
        let transport = Arc::new(HttpTransport::from_config(&config.endpoint));

        let service = Arc::new(
            self.builder(&config)
                .directory(directory)
                .transport(transport)
                .build()?,
        );

        let mut launcher = Launcher::new().with_config(&config);
        launcher.launch(service.clone()).await?;

        if let Some(addr) = service.local_addr().await {
            info!(
                topic = %service.settings().topic,
                "Listening on http://{}",
                addr
            );
        }

        launcher.wait().await;
        info!("Goodbye");

        Ok(())
    }

    fn load_config(&self) -> Result<TetherConfig> {
        if !Path::new(&self.config).exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }
        Ok(TetherConfig::from_file(&self.config)?)
    }

    /// Builder with command-line overrides and the built-in managers.
    fn builder(&self, config: &TetherConfig) -> ServiceBuilder {
        let mut registry = ManagerRegistry::new();
        registry.register(DEFAULT_MANAGER, |ctx| {
            Arc::new(StatusManager::new(ctx)) as Arc<dyn Manager>
        });

        let mut builder = ServiceBuilder::new()
            .config(config.clone())
            .registry(registry);

        if let Some(host) = &self.host {
            builder = builder.host(host.clone());
        }
        if let Some(binary) = &self.binary {
            builder = builder.binary(binary.clone());
        }
        if let Some(topic) = &self.topic {
            builder = builder.topic(topic.clone());
        }

        match &self.manager {
            Some(name) => builder.manager_name(name.clone()),
            None if config.managers.is_empty() => builder.manager_name(DEFAULT_MANAGER),
            None => builder,
        }
    }
}

fn init_tracing(observability: &ObservabilityConfig, dev: bool) {
    let level = if dev {
        "debug"
    } else {
        observability.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match observability.log_format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Pretty => subscriber.try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}
