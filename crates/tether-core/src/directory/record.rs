use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a record by the directory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Get the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node's registration entry in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Store-assigned ID.
    pub id: RecordId,
    /// Host the node runs on.
    pub host: String,
    /// Binary name of the node process.
    pub binary: String,
    /// Topic the node listens on.
    pub topic: String,
    /// Number of successful reports.
    pub report_count: u64,
    /// Availability zone of the node.
    pub availability_zone: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl DirectoryRecord {
    /// Whether the node reported recently enough to be considered alive.
    pub fn is_up(&self, now: DateTime<Utc>, considered_dead_after: Duration) -> bool {
        let threshold = chrono::Duration::from_std(considered_dead_after)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        now.signed_duration_since(self.updated_at) < threshold
    }
}

/// Fields for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub host: String,
    pub binary: String,
    pub topic: String,
    pub availability_zone: String,
}

/// Fields written by a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// New report count.
    pub report_count: u64,
    /// New availability zone, only when it changed.
    pub availability_zone: Option<String>,
}

impl RecordUpdate {
    /// Build the update for one heartbeat against the stored record.
    pub fn heartbeat(current: &DirectoryRecord, zone: &str) -> Self {
        let availability_zone = if current.availability_zone != zone {
            Some(zone.to_string())
        } else {
            None
        };

        Self {
            report_count: current.report_count + 1,
            availability_zone,
        }
    }

    /// Apply the update to a record in place.
    pub fn apply(&self, record: &mut DirectoryRecord, now: DateTime<Utc>) {
        record.report_count = self.report_count;
        if let Some(zone) = &self.availability_zone {
            record.availability_zone = zone.clone();
        }
        record.updated_at = now;
    }
}
