use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tether_core::directory::{
    DirectoryFuture, DirectoryRecord, DirectoryStore, NewRecord, RecordId, RecordUpdate,
};
use tether_core::{Result, TetherError};

use crate::directory::MemoryDirectory;

/// A call received by a [`RecordingDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Get(RecordId),
    GetByArgs { host: String, binary: String },
    Create { host: String, binary: String },
    Update { id: RecordId, report_count: u64 },
    Destroy(RecordId),
}

/// In-memory directory that journals every call and can inject faults.
///
/// Calls are journaled even when a fault makes them fail.
#[derive(Default)]
pub struct RecordingDirectory {
    inner: MemoryDirectory,
    calls: Mutex<Vec<DirectoryCall>>,
    unavailable: AtomicBool,
    lose_next_update: AtomicBool,
    read_latency: Mutex<Duration>,
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for inspecting or tampering with records.
    pub fn inner(&self) -> &MemoryDirectory {
        &self.inner
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the journal.
    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of `create` calls received.
    pub fn count_creates(&self) -> usize {
        self.count(|c| matches!(c, DirectoryCall::Create { .. }))
    }

    /// Number of `update` calls received.
    pub fn count_updates(&self) -> usize {
        self.count(|c| matches!(c, DirectoryCall::Update { .. }))
    }

    /// Make every call fail with `DirectoryUnavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delete the target record when the next update arrives, so that the
    /// update reports it as not found.
    pub fn lose_record_on_next_update(&self) {
        self.lose_next_update.store(true, Ordering::SeqCst);
    }

    /// Delay every `get` and `get_by_args` by `latency` before it reads.
    /// Writes stay immediate.
    pub fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    fn count(&self, matches: impl Fn(&DirectoryCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| matches(c))
            .count()
    }

    async fn record(&self, call: DirectoryCall) -> Result<()> {
        let is_read = matches!(call, DirectoryCall::Get(_) | DirectoryCall::GetByArgs { .. });
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        let latency = *self.read_latency.lock().unwrap_or_else(PoisonError::into_inner);
        if is_read && !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TetherError::DirectoryUnavailable(
                "injected outage".to_string(),
            ));
        }
        Ok(())
    }
}

impl DirectoryStore for RecordingDirectory {
    fn get(&self, id: RecordId) -> DirectoryFuture<'_, Option<DirectoryRecord>> {
        Box::pin(async move {
            self.record(DirectoryCall::Get(id)).await?;
            self.inner.get(id).await
        })
    }

    fn get_by_args<'a>(
        &'a self,
        host: &'a str,
        binary: &'a str,
    ) -> DirectoryFuture<'a, Option<DirectoryRecord>> {
        Box::pin(async move {
            self.record(DirectoryCall::GetByArgs {
                host: host.to_string(),
                binary: binary.to_string(),
            })
            .await?;
            self.inner.get_by_args(host, binary).await
        })
    }

    fn create(&self, record: NewRecord) -> DirectoryFuture<'_, DirectoryRecord> {
        Box::pin(async move {
            self.record(DirectoryCall::Create {
                host: record.host.clone(),
                binary: record.binary.clone(),
            })
            .await?;
            self.inner.create(record).await
        })
    }

    fn update(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> DirectoryFuture<'_, Option<DirectoryRecord>> {
        Box::pin(async move {
            self.record(DirectoryCall::Update {
                id,
                report_count: update.report_count,
            })
            .await?;

            if self.lose_next_update.swap(false, Ordering::SeqCst) {
                self.inner.remove(id).await;
                return Ok(None);
            }
            self.inner.update(id, update).await
        })
    }

    fn destroy(&self, id: RecordId) -> DirectoryFuture<'_, bool> {
        Box::pin(async move {
            self.record(DirectoryCall::Destroy(id)).await?;
            self.inner.destroy(id).await
        })
    }
}
