use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tether_core::directory::{
    DirectoryFuture, DirectoryRecord, DirectoryStore, NewRecord, RecordId, RecordUpdate,
};
use tether_core::TetherError;
use tokio::sync::RwLock;

/// Directory kept in process memory.
///
/// Suitable for single-node runs and tests; records do not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    records: HashMap<RecordId, DirectoryRecord>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, ordered by ID.
    pub async fn records(&self) -> Vec<DirectoryRecord> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.id.as_i64());
        records
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Whether the directory holds no records.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Drop a record, as an administrative cleanup would.
    pub async fn remove(&self, id: RecordId) -> bool {
        self.state.write().await.records.remove(&id).is_some()
    }
}

impl DirectoryStore for MemoryDirectory {
    fn get(&self, id: RecordId) -> DirectoryFuture<'_, Option<DirectoryRecord>> {
        Box::pin(async move { Ok(self.state.read().await.records.get(&id).cloned()) })
    }

    fn get_by_args<'a>(
        &'a self,
        host: &'a str,
        binary: &'a str,
    ) -> DirectoryFuture<'a, Option<DirectoryRecord>> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state
                .records
                .values()
                .find(|r| r.host == host && r.binary == binary)
                .cloned())
        })
    }

    fn create(&self, record: NewRecord) -> DirectoryFuture<'_, DirectoryRecord> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if state
                .records
                .values()
                .any(|r| r.host == record.host && r.binary == record.binary)
            {
                return Err(TetherError::InvalidArgument(format!(
                    "A record for {}/{} already exists",
                    record.host, record.binary
                )));
            }

            state.next_id += 1;
            let now = Utc::now();
            let created = DirectoryRecord {
                id: RecordId(state.next_id),
                host: record.host,
                binary: record.binary,
                topic: record.topic,
                report_count: 0,
                availability_zone: record.availability_zone,
                created_at: now,
                updated_at: now,
            };
            state.records.insert(created.id, created.clone());
            Ok(created)
        })
    }

    fn update(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> DirectoryFuture<'_, Option<DirectoryRecord>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            Ok(state.records.get_mut(&id).map(|record| {
                update.apply(record, Utc::now());
                record.clone()
            }))
        })
    }

    fn destroy(&self, id: RecordId) -> DirectoryFuture<'_, bool> {
        Box::pin(async move { Ok(self.remove(id).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(host: &str) -> NewRecord {
        NewRecord {
            host: host.to_string(),
            binary: "worker".to_string(),
            topic: "worker".to_string(),
            availability_zone: "az-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let directory = MemoryDirectory::new();
        let a = directory.create(new_record("h1")).await.unwrap();
        let b = directory.create(new_record("h2")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.report_count, 0);

        let found = directory.get_by_args("h2", "worker").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(b.id));
        assert!(directory.get_by_args("h3", "worker").await.unwrap().is_none());
        assert_eq!(directory.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_host_binary_rejected() {
        let directory = MemoryDirectory::new();
        directory.create(new_record("h1")).await.unwrap();
        let result = directory.create(new_record("h1")).await;
        assert!(matches!(result, Err(TetherError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let directory = MemoryDirectory::new();
        let update = RecordUpdate {
            report_count: 1,
            availability_zone: None,
        };
        assert!(directory.update(RecordId(99), update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy() {
        let directory = MemoryDirectory::new();
        let record = directory.create(new_record("h1")).await.unwrap();
        assert!(directory.destroy(record.id).await.unwrap());
        assert!(!directory.destroy(record.id).await.unwrap());
        assert!(directory.is_empty().await);
    }
}
