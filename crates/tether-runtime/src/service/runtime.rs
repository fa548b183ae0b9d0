use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use tether_core::directory::{DirectoryStore, RecordId};
use tether_core::endpoint::{Endpoint, EndpointFuture, EndpointTransport, Listener, Target};
use tether_core::{Manager, Result, TetherError};

use super::periodic::PeriodicTaskAction;
use super::settings::ServiceSettings;
use crate::cluster::{HealthHandle, HealthState, HeartbeatReporter, RecordKeeper};
use crate::timer::{fuzzy_delay, PeriodicTimer};

/// Lifecycle state of a [`ServiceRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// One worker service: directory record, endpoint listener and timers.
///
/// `start`, `stop`, `kill` and `wait` take `&self` and may be called from
/// different tasks.
pub struct ServiceRuntime {
    settings: ServiceSettings,
    manager: Arc<dyn Manager>,
    transport: Arc<dyn EndpointTransport>,
    keeper: Arc<RecordKeeper>,
    health: HealthState,
    state: watch::Sender<ServiceState>,
    inner: Mutex<Inner>,
    delay_seed: Option<u64>,
}

#[derive(Default)]
struct Inner {
    listener: Option<Box<dyn Listener>>,
    timers: Vec<Arc<PeriodicTimer>>,
    /// Timers told to stop, kept so `wait` can still observe them.
    retired: Vec<Arc<PeriodicTimer>>,
}

impl ServiceRuntime {
    /// Create a runtime. Invalid settings are rejected here, before any
    /// start attempt.
    pub fn new(
        mut settings: ServiceSettings,
        manager: Arc<dyn Manager>,
        directory: Arc<dyn DirectoryStore>,
        transport: Arc<dyn EndpointTransport>,
    ) -> Result<Self> {
        settings.validate()?;
        settings.reconcile();

        let keeper = Arc::new(RecordKeeper::new(
            directory,
            settings.host.clone(),
            settings.binary.clone(),
            settings.topic.clone(),
            settings.availability_zone.clone(),
        ));
        let (state, _) = watch::channel(ServiceState::Created);

        Ok(Self {
            settings,
            manager,
            transport,
            keeper,
            health: HealthState::new(),
            state,
            inner: Mutex::new(Inner::default()),
            delay_seed: None,
        })
    }

    /// Draw the periodic task's initial delay from a generator seeded with
    /// `seed` instead of the thread-local one.
    pub fn with_delay_seed(mut self, seed: u64) -> Self {
        self.delay_seed = Some(seed);
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    /// ID of the directory record held by this service.
    pub fn record_id(&self) -> Option<RecordId> {
        self.keeper.record_id()
    }

    /// Whether the last directory interaction failed.
    pub fn is_disconnected(&self) -> bool {
        self.health.is_disconnected()
    }

    pub fn health(&self) -> HealthHandle {
        self.health.handle()
    }

    /// Address of the bound listener, while there is one.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.inner
            .lock()
            .await
            .listener
            .as_ref()
            .and_then(|l| l.local_addr())
    }

    /// Whether the directory considers this service alive.
    pub async fn is_up(&self) -> bool {
        match self.keeper.fetch().await {
            Ok(Some(record)) => record.is_up(Utc::now(), self.settings.considered_dead_after),
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(topic = %self.settings.topic, error = %e, "Liveness check failed");
                false
            }
        }
    }

    /// Register in the directory, bind the endpoint and start the timers.
    ///
    /// Only configuration, manager init and bind failures are returned. A
    /// failed start leaves the service in `Created`. Manager init and
    /// registration run without the state lock, so `stop` and `kill` do not
    /// wait on them; a start overtaken by either returns `InvalidState`.
    pub async fn start(&self) -> Result<()> {
        {
            let _inner = self.inner.lock().await;
            let current = self.state();
            if current != ServiceState::Created {
                return Err(TetherError::InvalidState(format!(
                    "Service '{}' cannot start while {}",
                    self.settings.topic, current
                )));
            }
            self.state.send_replace(ServiceState::Starting);
        }

        tracing::info!(
            topic = %self.settings.topic,
            host = %self.settings.host,
            binary = %self.settings.binary,
            "Starting service"
        );

        let prepared = self.prepare().await;

        let mut inner = self.inner.lock().await;
        if self.state() != ServiceState::Starting {
            tracing::warn!(topic = %self.settings.topic, "Service stopped while starting");
            if self.keeper.is_retired() && self.keeper.record_id().is_some() {
                self.destroy_record().await;
            }
            return Err(TetherError::InvalidState(format!(
                "Service '{}' was stopped while starting",
                self.settings.topic
            )));
        }

        let result = match prepared {
            Ok(()) => self.serve(&mut inner).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.state.send_replace(ServiceState::Running);
                tracing::info!(
                    topic = %self.settings.topic,
                    timers = inner.timers.len(),
                    "Service running"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(topic = %self.settings.topic, error = %e, "Service failed to start");
                self.teardown(&mut inner).await;
                self.state.send_replace(ServiceState::Created);
                Err(e)
            }
        }
    }

    async fn prepare(&self) -> Result<()> {
        self.manager.init_host().await.map_err(|e| match e {
            TetherError::Manager(_) => e,
            other => TetherError::Manager(other.to_string()),
        })?;

        match self.keeper.register().await {
            Ok(record) => {
                self.health.record_success();
                tracing::debug!(record_id = %record.id, "Registered in directory");
            }
            Err(e) => {
                self.health.record_failure(&e);
            }
        }
        Ok(())
    }

    async fn serve(&self, inner: &mut Inner) -> Result<()> {
        let mut endpoints: Vec<Arc<dyn Endpoint>> =
            vec![Arc::new(ManagerEndpoint(self.manager.clone()))];
        endpoints.extend(self.manager.additional_endpoints());

        let target = Target::new(self.settings.topic.clone(), self.settings.host.clone());
        let listener = inner.listener.insert(self.transport.bind(target, endpoints).await?);
        listener.start().await?;

        let report_interval = self.settings.report_interval;
        if !report_interval.is_zero() {
            let mut timer = PeriodicTimer::new(
                format!("{}.heartbeat", self.settings.topic),
                HeartbeatReporter::new(self.keeper.clone(), self.health.clone()),
            );
            timer.start(report_interval, Some(report_interval))?;
            inner.timers.push(Arc::new(timer));
        }

        let periodic_interval = self.settings.periodic_interval;
        if !periodic_interval.is_zero() {
            let max_delay = self.settings.periodic_fuzzy_delay;
            let initial_delay = match self.delay_seed {
                Some(seed) => fuzzy_delay(max_delay, &mut StdRng::seed_from_u64(seed)),
                None => fuzzy_delay(max_delay, &mut rand::rng()),
            };
            let mut timer = PeriodicTimer::new(
                format!("{}.periodic", self.settings.topic),
                PeriodicTaskAction::new(self.manager.clone(), self.settings.raise_on_error),
            );
            timer.start(periodic_interval, initial_delay)?;
            inner.timers.push(Arc::new(timer));
        }

        Ok(())
    }

    /// Release the listener and stop every timer. Repeated calls are no-ops.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if self.state() == ServiceState::Stopped {
            return;
        }

        self.state.send_replace(ServiceState::Stopping);
        self.teardown(&mut inner).await;
        self.state.send_replace(ServiceState::Stopped);

        tracing::info!(topic = %self.settings.topic, "Service stopped");
    }

    /// Stop, let in-flight ticks finish, then delete this service's
    /// directory record. The record is not recreated afterwards.
    pub async fn kill(&self) {
        self.stop().await;
        self.wait().await;
        self.destroy_record().await;
    }

    async fn destroy_record(&self) {
        match self.keeper.destroy().await {
            Ok(true) => {
                tracing::info!(topic = %self.settings.topic, "Removed directory record");
            }
            Ok(false) => {
                tracing::debug!(topic = %self.settings.topic, "No directory record to remove");
            }
            Err(e) => {
                tracing::warn!(
                    topic = %self.settings.topic,
                    error = %e,
                    "Failed to remove directory record"
                );
            }
        }
    }

    /// Wait until every timer started so far has ended.
    pub async fn wait(&self) {
        let timers: Vec<Arc<PeriodicTimer>> = {
            let inner = self.inner.lock().await;
            inner
                .timers
                .iter()
                .chain(inner.retired.iter())
                .cloned()
                .collect()
        };

        for timer in timers {
            timer.wait().await;
        }
    }

    async fn teardown(&self, inner: &mut Inner) {
        if let Some(mut listener) = inner.listener.take() {
            if let Err(e) = listener.stop().await {
                tracing::warn!(
                    topic = %self.settings.topic,
                    error = %e,
                    "Failed to stop endpoint listener"
                );
            }
        }

        for timer in std::mem::take(&mut inner.timers) {
            timer.stop();
            tracing::debug!(timer = %timer.name(), "Timer stop requested");
            inner.retired.push(timer);
        }
    }
}

/// Exposes the manager as the primary endpoint of its service.
struct ManagerEndpoint(Arc<dyn Manager>);

impl Endpoint for ManagerEndpoint {
    fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    fn handles(&self, method: &str) -> bool {
        self.0.handles(method)
    }

    fn call<'a>(&'a self, method: &'a str, args: Value) -> EndpointFuture<'a, Value> {
        self.0.call(method, args)
    }
}
