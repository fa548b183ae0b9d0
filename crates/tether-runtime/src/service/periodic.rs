use std::sync::Arc;

use tether_core::{Manager, TetherError};

use crate::timer::{TickError, TickFuture, TimerAction};

/// Timer action running the manager's periodic work.
pub struct PeriodicTaskAction {
    manager: Arc<dyn Manager>,
    raise_on_error: bool,
}

impl PeriodicTaskAction {
    pub fn new(manager: Arc<dyn Manager>, raise_on_error: bool) -> Self {
        Self {
            manager,
            raise_on_error,
        }
    }
}

impl TimerAction for PeriodicTaskAction {
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin(async move {
            let Err(e) = self.manager.periodic_tick(self.raise_on_error).await else {
                return Ok(());
            };

            let failure = match e {
                TetherError::DomainTaskFailure(_) => e,
                other => TetherError::DomainTaskFailure(other.to_string()),
            };
            if self.raise_on_error {
                Err(TickError::Abort(failure.to_string()))
            } else {
                Err(TickError::Failed(failure.to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingManager;

    #[tokio::test]
    async fn test_failure_mode_follows_raise_flag() {
        let manager = Arc::new(CountingManager::new());
        manager.set_fail_ticks(true);

        let mut lenient = PeriodicTaskAction::new(manager.clone(), false);
        assert!(matches!(lenient.tick().await, Err(TickError::Failed(_))));

        let mut strict = PeriodicTaskAction::new(manager.clone(), true);
        assert!(matches!(strict.tick().await, Err(TickError::Abort(_))));

        manager.set_fail_ticks(false);
        assert_eq!(strict.tick().await, Ok(()));
        assert_eq!(manager.ticks(), 3);
    }
}
