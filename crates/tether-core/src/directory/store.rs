use std::future::Future;
use std::pin::Pin;

use super::record::{DirectoryRecord, NewRecord, RecordId, RecordUpdate};
use crate::Result;

/// Boxed future returned by directory operations.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Shared store of node records.
///
/// "Not found" is reported through `Option`/`bool`, never as an error.
/// Errors mean the store could not be reached or refused the write.
pub trait DirectoryStore: Send + Sync + 'static {
    /// Fetch a record by ID.
    fn get(&self, id: RecordId) -> DirectoryFuture<'_, Option<DirectoryRecord>>;

    /// Fetch the record registered for a host and binary.
    fn get_by_args<'a>(
        &'a self,
        host: &'a str,
        binary: &'a str,
    ) -> DirectoryFuture<'a, Option<DirectoryRecord>>;

    /// Create a record with a report count of zero.
    fn create(&self, record: NewRecord) -> DirectoryFuture<'_, DirectoryRecord>;

    /// Write report fields. Returns `None` when the record does not exist.
    fn update(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> DirectoryFuture<'_, Option<DirectoryRecord>>;

    /// Delete a record. Returns `false` when it did not exist.
    fn destroy(&self, id: RecordId) -> DirectoryFuture<'_, bool>;
}
