pub mod config;
pub mod directory;
pub mod endpoint;
pub mod error;
pub mod manager;

pub use config::TetherConfig;
pub use directory::{DirectoryRecord, DirectoryStore, NewRecord, RecordId, RecordUpdate};
pub use endpoint::{Endpoint, EndpointTransport, Listener, Target};
pub use error::{Result, TetherError};
pub use manager::{Manager, ManagerContext};
