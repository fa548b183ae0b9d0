use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::Value;
use tether_core::endpoint::{Endpoint, EndpointFuture};
use tether_core::{Manager, TetherError};

/// Manager that counts init and tick calls and can be told to fail.
///
/// Answers `ping` with `"pong"` and `ticks` with the tick count.
#[derive(Default)]
pub struct CountingManager {
    inits: AtomicUsize,
    ticks: AtomicUsize,
    fail_init: AtomicBool,
    fail_ticks: AtomicBool,
}

impl CountingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ticks(&self, fail: bool) {
        self.fail_ticks.store(fail, Ordering::SeqCst);
    }
}

impl Endpoint for CountingManager {
    fn handles(&self, method: &str) -> bool {
        matches!(method, "ping" | "ticks")
    }

    fn call<'a>(&'a self, method: &'a str, _args: Value) -> EndpointFuture<'a, Value> {
        Box::pin(async move {
            match method {
                "ping" => Ok(Value::from("pong")),
                "ticks" => Ok(Value::from(self.ticks())),
                other => Err(TetherError::NotFound(format!(
                    "Method '{}' not found",
                    other
                ))),
            }
        })
    }
}

impl Manager for CountingManager {
    fn init_host(&self) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init.load(Ordering::SeqCst) {
                return Err(TetherError::Manager("injected init failure".to_string()));
            }
            Ok(())
        })
    }

    fn periodic_tick(&self, _raise_on_error: bool) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.fail_ticks.load(Ordering::SeqCst) {
                return Err(TetherError::DomainTaskFailure(
                    "injected tick failure".to_string(),
                ));
            }
            Ok(())
        })
    }
}
