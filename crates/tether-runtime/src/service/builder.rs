use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tether_core::directory::DirectoryStore;
use tether_core::endpoint::EndpointTransport;
use tether_core::{Manager, ManagerContext, Result, TetherConfig, TetherError};

use super::runtime::ServiceRuntime;
use super::settings::ServiceSettings;

/// Constructs a manager for a service.
pub type ManagerFactory = Arc<dyn Fn(&ManagerContext) -> Arc<dyn Manager> + Send + Sync>;

/// Prefix stripped from a topic to find its manager setting.
const TOPIC_PREFIX: &str = "tether-";

/// Managers available by name.
#[derive(Clone, Default)]
pub struct ManagerRegistry {
    factories: HashMap<String, ManagerFactory>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ManagerContext) -> Arc<dyn Manager> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct the manager registered under `name`.
    pub fn create(&self, name: &str, context: &ManagerContext) -> Option<Arc<dyn Manager>> {
        self.factories.get(name).map(|factory| factory(context))
    }
}

/// Builder resolving unset service parameters from configuration.
///
/// Host defaults to the configured host, then the machine hostname. Binary
/// defaults to the executable name and topic to the binary. The manager
/// comes from the `[managers]` entry for the topic, with any `tether-`
/// prefix removed.
pub struct ServiceBuilder {
    config: TetherConfig,
    registry: ManagerRegistry,
    host: Option<String>,
    binary: Option<String>,
    topic: Option<String>,
    manager: Option<Arc<dyn Manager>>,
    manager_name: Option<String>,
    service_name: Option<String>,
    report_interval: Option<Duration>,
    periodic_interval: Option<Duration>,
    periodic_fuzzy_delay: Option<Duration>,
    raise_on_error: bool,
    directory: Option<Arc<dyn DirectoryStore>>,
    transport: Option<Arc<dyn EndpointTransport>>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: TetherConfig::default(),
            registry: ManagerRegistry::new(),
            host: None,
            binary: None,
            topic: None,
            manager: None,
            manager_name: None,
            service_name: None,
            report_interval: None,
            periodic_interval: None,
            periodic_fuzzy_delay: None,
            raise_on_error: false,
            directory: None,
            transport: None,
        }
    }

    pub fn config(mut self, config: TetherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: ManagerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Use this manager instead of looking one up.
    pub fn manager(mut self, manager: Arc<dyn Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Use the registered manager `name` instead of the configured one.
    pub fn manager_name(mut self, name: impl Into<String>) -> Self {
        self.manager_name = Some(name.into());
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = Some(interval);
        self
    }

    pub fn periodic_interval(mut self, interval: Duration) -> Self {
        self.periodic_interval = Some(interval);
        self
    }

    pub fn periodic_fuzzy_delay(mut self, delay: Duration) -> Self {
        self.periodic_fuzzy_delay = Some(delay);
        self
    }

    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn DirectoryStore>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn EndpointTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Resolve the settings without building a runtime.
    pub fn settings(&self) -> Result<ServiceSettings> {
        let host = match self.host.clone().or_else(|| self.config.service.host.clone()) {
            Some(host) => host,
            None => machine_hostname()?,
        };
        let binary = match self.binary.clone() {
            Some(binary) => binary,
            None => executable_name()?,
        };
        let topic = self.topic.clone().unwrap_or_else(|| binary.clone());

        let mut settings = ServiceSettings::from_config(host, binary, topic, &self.config.service);
        if let Some(interval) = self.report_interval {
            settings.report_interval = interval;
        }
        if let Some(interval) = self.periodic_interval {
            settings.periodic_interval = interval;
        }
        if let Some(delay) = self.periodic_fuzzy_delay {
            settings.periodic_fuzzy_delay = delay;
        }
        settings.raise_on_error = self.raise_on_error;
        settings.service_name = self.service_name.clone();

        settings.validate()?;
        Ok(settings)
    }

    /// Resolve everything and construct the runtime.
    pub fn build(self) -> Result<ServiceRuntime> {
        let settings = self.settings()?;

        let directory = self.directory.clone().ok_or_else(|| {
            TetherError::InvalidConfiguration("no directory store given".to_string())
        })?;
        let transport = self.transport.clone().ok_or_else(|| {
            TetherError::InvalidConfiguration("no endpoint transport given".to_string())
        })?;
        let manager = self.resolve_manager(&settings)?;

        tracing::debug!(
            topic = %settings.topic,
            host = %settings.host,
            binary = %settings.binary,
            "Resolved service settings"
        );

        ServiceRuntime::new(settings, manager, directory, transport)
    }

    fn resolve_manager(&self, settings: &ServiceSettings) -> Result<Arc<dyn Manager>> {
        if let Some(manager) = &self.manager {
            return Ok(manager.clone());
        }

        let key = manager_key(&settings.topic);
        let name = match &self.manager_name {
            Some(name) => name.as_str(),
            None => match self.config.manager_for(key) {
                Some(name) => name,
                None if self.registry.contains(key) => key,
                None => {
                    return Err(TetherError::InvalidConfiguration(format!(
                        "no manager configured for topic '{}' (set managers.{})",
                        settings.topic, key
                    )))
                }
            },
        };

        let context = ManagerContext {
            host: settings.host.clone(),
            service_name: settings.service_name.clone(),
        };
        self.registry.create(name, &context).ok_or_else(|| {
            TetherError::InvalidConfiguration(format!(
                "unknown manager '{}' (registered: {})",
                name,
                self.registry.names().join(", ")
            ))
        })
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The part of a topic after the last `tether-`.
fn manager_key(topic: &str) -> &str {
    topic
        .rsplit_once(TOPIC_PREFIX)
        .map(|(_, rest)| rest)
        .unwrap_or(topic)
}

fn machine_hostname() -> Result<String> {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .map_err(|e| {
            TetherError::InvalidConfiguration(format!("Failed to read hostname: {}", e))
        })
}

fn executable_name() -> Result<String> {
    let exe = std::env::current_exe().map_err(|e| {
        TetherError::InvalidConfiguration(format!("Failed to locate executable: {}", e))
    })?;

    exe.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            TetherError::InvalidConfiguration(format!(
                "Executable path {} has no usable name",
                exe.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingManager, LocalTransport, RecordingDirectory};

    fn registry() -> ManagerRegistry {
        let mut registry = ManagerRegistry::new();
        registry.register("volume", |_| Arc::new(CountingManager::new()) as Arc<dyn Manager>);
        registry
    }

    fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
            .registry(registry())
            .directory(Arc::new(RecordingDirectory::new()))
            .transport(Arc::new(LocalTransport::new()))
    }

    #[test]
    fn test_manager_key_strips_prefix() {
        assert_eq!(manager_key("tether-volume"), "volume");
        assert_eq!(manager_key("volume"), "volume");
        assert_eq!(manager_key("site-tether-backup"), "backup");
    }

    #[test]
    fn test_topic_defaults_to_binary() {
        let settings = builder()
            .host("h1")
            .binary("tether-volume")
            .settings()
            .unwrap();
        assert_eq!(settings.topic, "tether-volume");
    }

    #[test]
    fn test_host_from_config_then_hostname() {
        let mut config = TetherConfig::default();
        config.service.host = Some("storage-01".to_string());

        let settings = builder()
            .config(config)
            .binary("worker")
            .settings()
            .unwrap();
        assert_eq!(settings.host, "storage-01");

        let settings = builder().host("explicit").binary("worker").settings().unwrap();
        assert_eq!(settings.host, "explicit");
    }

    #[test]
    fn test_binary_defaults_to_executable() {
        let settings = builder().host("h1").settings().unwrap();
        assert!(!settings.binary.is_empty());
        assert_eq!(settings.topic, settings.binary);
    }

    #[test]
    fn test_intervals_from_config_and_overrides() {
        let mut config = TetherConfig::default();
        config.service.report_interval_secs = 5;
        config.service.periodic_interval_secs = 0;

        let settings = builder()
            .config(config)
            .host("h1")
            .binary("worker")
            .periodic_fuzzy_delay(Duration::from_secs(3))
            .settings()
            .unwrap();
        assert_eq!(settings.report_interval, Duration::from_secs(5));
        assert_eq!(settings.periodic_interval, Duration::ZERO);
        assert_eq!(settings.periodic_fuzzy_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_manager_from_config() {
        let mut config = TetherConfig::default();
        config
            .managers
            .insert("storage".to_string(), "volume".to_string());

        let runtime = builder()
            .config(config)
            .host("h1")
            .binary("tether-storage")
            .build()
            .unwrap();
        assert_eq!(runtime.settings().topic, "tether-storage");
    }

    #[test]
    fn test_manager_falls_back_to_registered_topic() {
        let runtime = builder().host("h1").binary("tether-volume").build();
        assert!(runtime.is_ok());
    }

    #[test]
    fn test_unresolvable_manager_is_rejected() {
        let result = builder().host("h1").binary("tether-scheduler").build();
        assert!(matches!(result, Err(TetherError::InvalidConfiguration(_))));

        let result = builder()
            .host("h1")
            .binary("worker")
            .manager_name("missing")
            .build();
        assert!(matches!(result, Err(TetherError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_directory_is_required() {
        let result = ServiceBuilder::new()
            .host("h1")
            .binary("worker")
            .manager(Arc::new(CountingManager::new()))
            .transport(Arc::new(LocalTransport::new()))
            .build();
        assert!(matches!(result, Err(TetherError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_registry_passes_context() {
        let mut registry = ManagerRegistry::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        registry.register("volume", move |ctx: &ManagerContext| {
            *sink.lock().unwrap() = Some(ctx.clone());
            Arc::new(CountingManager::new()) as Arc<dyn Manager>
        });

        builder()
            .registry(registry)
            .host("h1")
            .binary("volume")
            .service_name("volume-a")
            .build()
            .unwrap();

        let context = seen.lock().unwrap().clone().unwrap();
        assert_eq!(context.host, "h1");
        assert_eq!(context.service_name.as_deref(), Some("volume-a"));
    }
}
