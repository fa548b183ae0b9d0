use std::sync::Arc;

use tether_core::TetherError;
use tokio::sync::watch;

/// A change of the directory connection flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// The first failure after a healthy period.
    WentAway,
    /// The first success after a failure episode.
    Recovered,
}

/// Whether the last directory interaction failed.
///
/// Only the owning service writes the flag; any number of
/// [`HealthHandle`]s observe it.
#[derive(Clone)]
pub struct HealthState {
    disconnected: Arc<watch::Sender<bool>>,
}

impl HealthState {
    /// Create a connected health state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            disconnected: Arc::new(tx),
        }
    }

    /// Whether the directory is currently considered unreachable.
    pub fn is_disconnected(&self) -> bool {
        *self.disconnected.borrow()
    }

    /// Get a read-only handle.
    pub fn handle(&self) -> HealthHandle {
        HealthHandle {
            rx: self.disconnected.subscribe(),
        }
    }

    /// Note a failed interaction. Returns the transition, if this failure
    /// started a new episode.
    pub fn record_failure(&self, error: &TetherError) -> Option<HealthTransition> {
        if !self.set(true) {
            return None;
        }

        tracing::error!(error = %error, "Directory store went away");
        Some(HealthTransition::WentAway)
    }

    /// Note a successful interaction. Returns the transition, if this
    /// success ended a failure episode.
    pub fn record_success(&self) -> Option<HealthTransition> {
        if !self.set(false) {
            return None;
        }

        tracing::error!("Recovered directory store connection");
        Some(HealthTransition::Recovered)
    }

    fn set(&self, disconnected: bool) -> bool {
        self.disconnected.send_if_modified(|current| {
            if *current == disconnected {
                false
            } else {
                *current = disconnected;
                true
            }
        })
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`HealthState`].
#[derive(Clone)]
pub struct HealthHandle {
    rx: watch::Receiver<bool>,
}

impl HealthHandle {
    /// Whether the directory is currently considered unreachable.
    pub fn is_disconnected(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next transition. Returns `None` once the state is gone.
    pub async fn next_transition(&mut self) -> Option<HealthTransition> {
        self.rx.changed().await.ok()?;
        if *self.rx.borrow_and_update() {
            Some(HealthTransition::WentAway)
        } else {
            Some(HealthTransition::Recovered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> TetherError {
        TetherError::DirectoryUnavailable("connection refused".into())
    }

    #[test]
    fn test_initially_connected() {
        let health = HealthState::new();
        assert!(!health.is_disconnected());
        assert_eq!(health.record_success(), None);
    }

    #[test]
    fn test_transitions_once_per_episode() {
        let health = HealthState::new();

        assert_eq!(
            health.record_failure(&unavailable()),
            Some(HealthTransition::WentAway)
        );
        assert_eq!(health.record_failure(&unavailable()), None);
        assert_eq!(health.record_failure(&unavailable()), None);
        assert!(health.is_disconnected());

        assert_eq!(health.record_success(), Some(HealthTransition::Recovered));
        assert_eq!(health.record_success(), None);
        assert!(!health.is_disconnected());

        assert_eq!(
            health.record_failure(&unavailable()),
            Some(HealthTransition::WentAway)
        );
    }

    #[tokio::test]
    async fn test_handle_observes_transitions() {
        let health = HealthState::new();
        let mut handle = health.handle();

        health.record_failure(&unavailable());
        health.record_failure(&unavailable());
        assert_eq!(
            handle.next_transition().await,
            Some(HealthTransition::WentAway)
        );
        assert!(handle.is_disconnected());

        health.record_success();
        assert_eq!(
            handle.next_transition().await,
            Some(HealthTransition::Recovered)
        );

        drop(health);
        assert_eq!(handle.next_transition().await, None);
    }
}
