use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use tether_core::{Result, TetherError};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Boxed future returned by a timer action.
pub type TickFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<(), TickError>> + Send + 'a>>;

/// Failure reported by a single firing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// Logged; the timer keeps firing.
    #[error("{0}")]
    Failed(String),

    /// Logged; the timer stops firing.
    #[error("{0}")]
    Abort(String),
}

/// Work invoked on every firing of a [`PeriodicTimer`].
///
/// The timer owns its action, so firings get exclusive access and never
/// overlap.
pub trait TimerAction: Send + 'static {
    fn tick(&mut self) -> TickFuture<'_>;
}

/// Adapter turning a closure into a [`TimerAction`].
pub struct FnAction<F>(pub F);

impl<F, Fut> TimerAction for FnAction<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<(), TickError>> + Send + 'static,
{
    fn tick(&mut self) -> TickFuture<'_> {
        Box::pin((self.0)())
    }
}

/// Fires an action at a fixed interval on its own task.
pub struct PeriodicTimer {
    name: String,
    action: Mutex<Option<Box<dyn TimerAction>>>,
    shutdown_tx: watch::Sender<bool>,
    finished_rx: Option<watch::Receiver<bool>>,
    running: Arc<AtomicBool>,
    fired: Arc<AtomicU64>,
}

impl PeriodicTimer {
    /// Create a timer for `action`. Nothing runs until [`start`](Self::start).
    pub fn new(name: impl Into<String>, action: impl TimerAction) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            action: Mutex::new(Some(Box::new(action))),
            shutdown_tx,
            finished_rx: None,
            running: Arc::new(AtomicBool::new(false)),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a timer from a closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), TickError>> + Send + 'static,
    {
        Self::new(name, FnAction(f))
    }

    /// Timer name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the background task is still firing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the background task has ended (or never started).
    pub fn is_finished(&self) -> bool {
        self.finished_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(true)
    }

    /// Number of firings so far.
    pub fn fire_count(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    /// Start firing every `interval`, first after `initial_delay`
    /// (immediately when `None`).
    pub fn start(&mut self, interval: Duration, initial_delay: Option<Duration>) -> Result<()> {
        if interval.is_zero() {
            return Err(TetherError::InvalidConfiguration(format!(
                "Timer '{}' interval must be greater than zero",
                self.name
            )));
        }

        let action = self
            .action
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                TetherError::InvalidState(format!("Timer '{}' was already started", self.name))
            })?;

        let (finished_tx, finished_rx) = watch::channel(false);
        self.finished_rx = Some(finished_rx);
        self.running.store(true, Ordering::SeqCst);

        let timer_loop = TimerLoop {
            name: self.name.clone(),
            interval,
            initial_delay,
            shutdown_rx: self.shutdown_tx.subscribe(),
            fired: self.fired.clone(),
        };
        let running = self.running.clone();

        tokio::spawn(async move {
            timer_loop.run(action).await;
            running.store(false, Ordering::SeqCst);
            let _ = finished_tx.send(true);
        });

        Ok(())
    }

    /// Stop firing. A firing already in progress runs to completion.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Wait until the background task has ended.
    pub async fn wait(&self) {
        if let Some(rx) = &self.finished_rx {
            let mut rx = rx.clone();
            let _ = rx.wait_for(|finished| *finished).await;
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

struct TimerLoop {
    name: String,
    interval: Duration,
    initial_delay: Option<Duration>,
    shutdown_rx: watch::Receiver<bool>,
    fired: Arc<AtomicU64>,
}

impl TimerLoop {
    async fn run(mut self, mut action: Box<dyn TimerAction>) {
        if let Some(delay) = self.initial_delay.filter(|d| !d.is_zero()) {
            tokio::select! {
                biased;
                _ = stop_requested(&mut self.shutdown_rx) => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut self.shutdown_rx) => break,
                _ = ticker.tick() => {}
            }

            if *self.shutdown_rx.borrow() {
                break;
            }

            let started = Instant::now();
            let outcome = AssertUnwindSafe(action.tick()).catch_unwind().await;
            self.fired.fetch_add(1, Ordering::SeqCst);

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(TickError::Failed(error))) => {
                    tracing::error!(timer = %self.name, error = %error, "Periodic action failed");
                }
                Ok(Err(TickError::Abort(error))) => {
                    tracing::error!(
                        timer = %self.name,
                        error = %error,
                        "Periodic action aborted, no further runs"
                    );
                    break;
                }
                Err(_) => {
                    tracing::error!(timer = %self.name, "Periodic action panicked");
                }
            }

            let elapsed = started.elapsed();
            if elapsed > self.interval {
                tracing::warn!(
                    timer = %self.name,
                    overrun_ms = (elapsed - self.interval).as_millis() as u64,
                    "Periodic action outlasted its interval"
                );
            }
        }

        tracing::debug!(timer = %self.name, "Timer stopped");
    }
}

/// Resolves once a stop was requested or the owning timer was dropped.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}
