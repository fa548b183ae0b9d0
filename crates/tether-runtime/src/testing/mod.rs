//! Test doubles for services built on the runtime.
//!
//! Provides a journaling directory with fault injection, an in-process
//! transport and a manager that counts what the runtime asks of it.

mod directory;
mod manager;
mod transport;

pub use directory::{DirectoryCall, RecordingDirectory};
pub use manager::CountingManager;
pub use transport::{LocalListener, LocalTransport};

use std::time::Duration;

use crate::service::ServiceSettings;

/// Settings for a `worker` service on host `h1` with every timer disabled.
///
/// Tests enable the intervals they exercise.
pub fn quiet_settings() -> ServiceSettings {
    ServiceSettings {
        report_interval: Duration::ZERO,
        periodic_interval: Duration::ZERO,
        periodic_fuzzy_delay: Duration::ZERO,
        ..ServiceSettings::new("h1", "worker", "worker")
    }
}
