mod health;
mod heartbeat;

pub use health::{HealthHandle, HealthState, HealthTransition};
pub use heartbeat::{HeartbeatReporter, RecordKeeper};
