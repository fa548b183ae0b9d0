//! Tether - worker-service runtime
//!
//! Every long-lived node process uses it to:
//! - Register in a shared directory and report liveness
//! - Run periodic domain work with a randomized start
//! - Serve a request/response endpoint with clean start/stop/wait

pub mod status;

pub use status::StatusManager;

/// Prelude module for common imports.
pub mod prelude {
    pub use tether_core::config::TetherConfig;
    pub use tether_core::directory::{DirectoryRecord, DirectoryStore, RecordId};
    pub use tether_core::endpoint::{Endpoint, EndpointFuture, EndpointTransport, Target};
    pub use tether_core::error::{Result, TetherError};
    pub use tether_core::manager::{Manager, ManagerContext};

    pub use tether_runtime::directory::{MemoryDirectory, PgDirectory};
    pub use tether_runtime::endpoint::{HttpTransport, RpcClient};
    pub use tether_runtime::service::{
        Launcher, ManagerRegistry, ServiceBuilder, ServiceRuntime, ServiceState,
    };

    pub use crate::StatusManager;
}
