mod record;
mod store;

pub use record::{DirectoryRecord, NewRecord, RecordId, RecordUpdate};
pub use store::{DirectoryFuture, DirectoryStore};
