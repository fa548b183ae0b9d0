use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tether_core::directory::{DirectoryRecord, DirectoryStore, NewRecord, RecordId, RecordUpdate};
use tether_core::{Result, TetherError};
use tokio::sync::watch;

use super::health::{HealthState, HealthTransition};
use crate::timer::{TickFuture, TimerAction};

/// Keeps this node's record in the directory alive.
///
/// The held record ID is written at startup and by the heartbeat only.
/// Once [`destroy`](Self::destroy) has run the keeper is retired and never
/// creates a record again.
pub struct RecordKeeper {
    directory: Arc<dyn DirectoryStore>,
    host: String,
    binary: String,
    topic: String,
    availability_zone: String,
    record_id: watch::Sender<Option<RecordId>>,
    retired: AtomicBool,
}

impl RecordKeeper {
    /// Create a keeper for the node identified by `host` and `binary`.
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        host: impl Into<String>,
        binary: impl Into<String>,
        topic: impl Into<String>,
        availability_zone: impl Into<String>,
    ) -> Self {
        let (record_id, _) = watch::channel(None);
        Self {
            directory,
            host: host.into(),
            binary: binary.into(),
            topic: topic.into(),
            availability_zone: availability_zone.into(),
            record_id,
            retired: AtomicBool::new(false),
        }
    }

    /// ID of the record this node currently holds.
    pub fn record_id(&self) -> Option<RecordId> {
        *self.record_id.borrow()
    }

    /// Whether the record was destroyed and must stay gone.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Find the record registered for this host and binary, creating it
    /// when there is none.
    pub async fn register(&self) -> Result<DirectoryRecord> {
        self.ensure_active()?;
        match self
            .directory
            .get_by_args(&self.host, &self.binary)
            .await?
        {
            Some(record) => {
                self.record_id.send_replace(Some(record.id));
                Ok(record)
            }
            None => self.create().await,
        }
    }

    /// Fetch the held record without repairing anything.
    pub async fn fetch(&self) -> Result<Option<DirectoryRecord>> {
        match self.record_id() {
            Some(id) => self.directory.get(id).await,
            None => Ok(None),
        }
    }

    /// Fetch the held record, recreating it when the store no longer has it.
    pub async fn current(&self) -> Result<DirectoryRecord> {
        self.ensure_active()?;
        let Some(id) = self.record_id() else {
            return self.register().await;
        };

        if let Some(record) = self.directory.get(id).await? {
            return Ok(record);
        }

        tracing::debug!(record_id = %id, "Directory record disappeared, recreating it");
        let created = self.create().await?;
        self.directory.get(created.id).await?.ok_or_else(|| {
            TetherError::RecordMissing(format!("record {} vanished after creation", created.id))
        })
    }

    /// Write one report: bump the report count and refresh the zone.
    pub async fn report(&self) -> Result<DirectoryRecord> {
        let current = self.current().await?;
        let update = RecordUpdate::heartbeat(&current, &self.availability_zone);

        self.directory
            .update(current.id, update)
            .await?
            .ok_or_else(|| {
                TetherError::RecordMissing(format!("record {} vanished during report", current.id))
            })
    }

    /// Retire the keeper and delete the held record. Returns `false` when
    /// there was nothing to delete.
    pub async fn destroy(&self) -> Result<bool> {
        self.retired.store(true, Ordering::SeqCst);
        let Some(id) = self.record_id() else {
            return Ok(false);
        };

        let existed = self.directory.destroy(id).await?;
        self.record_id.send_replace(None);
        Ok(existed)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_retired() {
            return Err(TetherError::InvalidState(format!(
                "directory record for {}/{} was destroyed",
                self.host, self.binary
            )));
        }
        Ok(())
    }

    async fn create(&self) -> Result<DirectoryRecord> {
        self.ensure_active()?;
        let record = self
            .directory
            .create(NewRecord {
                host: self.host.clone(),
                binary: self.binary.clone(),
                topic: self.topic.clone(),
                availability_zone: self.availability_zone.clone(),
            })
            .await?;

        tracing::info!(
            record_id = %record.id,
            host = %self.host,
            binary = %self.binary,
            "Created directory record"
        );
        self.record_id.send_replace(Some(record.id));
        Ok(record)
    }
}

/// Timer action reporting liveness to the directory.
pub struct HeartbeatReporter {
    keeper: Arc<RecordKeeper>,
    health: HealthState,
}

impl HeartbeatReporter {
    pub fn new(keeper: Arc<RecordKeeper>, health: HealthState) -> Self {
        Self { keeper, health }
    }

    /// Report once. Failures only change the health state.
    pub async fn report_state(&mut self) -> Option<HealthTransition> {
        match self.keeper.report().await {
            Ok(record) => {
                tracing::trace!(
                    record_id = %record.id,
                    report_count = record.report_count,
                    "Reported state"
                );
                self.health.record_success()
            }
            Err(e) => self.health.record_failure(&e),
        }
    }
}

impl TimerAction for HeartbeatReporter {
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin(async move {
            self.report_state().await;
            Ok(())
        })
    }
}
