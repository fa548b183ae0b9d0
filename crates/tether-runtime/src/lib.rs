pub mod cluster;
pub mod directory;
pub mod endpoint;
pub mod service;
pub mod timer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cluster::{HealthHandle, HealthState, HealthTransition, HeartbeatReporter, RecordKeeper};
pub use directory::{MemoryDirectory, PgDirectory};
pub use endpoint::{Dispatcher, HttpListener, HttpTransport, RpcClient};
pub use service::{
    Launcher, ManagerRegistry, ServiceBuilder, ServiceRuntime, ServiceSettings, ServiceState,
};
pub use timer::{fuzzy_delay, PeriodicTimer, TickError, TimerAction};
