use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tether_core::endpoint::{Endpoint, EndpointFuture, EndpointTransport, Listener, Target};
use tether_core::{Result, TetherError};

use crate::endpoint::Dispatcher;

/// In-process transport. Calls go straight to the bound dispatcher.
#[derive(Clone, Default)]
pub struct LocalTransport {
    state: Arc<LocalState>,
}

#[derive(Default)]
struct LocalState {
    binds: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_bind: AtomicBool,
    serving: Mutex<HashMap<String, Dispatcher>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent binds fail with `EndpointBindFailure`.
    pub fn fail_bind(&self, fail: bool) {
        self.state.fail_bind.store(fail, Ordering::SeqCst);
    }

    pub fn binds(&self) -> usize {
        self.state.binds.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    /// Number of listeners released.
    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    /// Whether a started listener serves `topic`.
    pub fn is_serving(&self, topic: &str) -> bool {
        self.state.serving().contains_key(topic)
    }

    /// Call `method` on the listener serving `topic`.
    pub async fn call(&self, topic: &str, method: &str, args: Value) -> Result<Value> {
        let dispatcher = self
            .state
            .serving()
            .get(topic)
            .cloned()
            .ok_or_else(|| TetherError::Endpoint(format!("No listener for topic '{}'", topic)))?;

        dispatcher.dispatch(method, args).await
    }
}

impl LocalState {
    fn serving(&self) -> std::sync::MutexGuard<'_, HashMap<String, Dispatcher>> {
        self.serving.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EndpointTransport for LocalTransport {
    fn bind(
        &self,
        target: Target,
        endpoints: Vec<Arc<dyn Endpoint>>,
    ) -> EndpointFuture<'_, Box<dyn Listener>> {
        Box::pin(async move {
            if self.state.fail_bind.load(Ordering::SeqCst) {
                return Err(TetherError::EndpointBindFailure(format!(
                    "{}: injected bind failure",
                    target
                )));
            }

            self.state.binds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(LocalListener {
                target,
                dispatcher: Dispatcher::new(endpoints),
                state: self.state.clone(),
                released: false,
            }) as Box<dyn Listener>)
        })
    }
}

/// Listener created by [`LocalTransport`].
pub struct LocalListener {
    target: Target,
    dispatcher: Dispatcher,
    state: Arc<LocalState>,
    released: bool,
}

impl Listener for LocalListener {
    fn start(&mut self) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            if self.released {
                return Err(TetherError::InvalidState(format!(
                    "Listener for {} was stopped",
                    self.target
                )));
            }

            self.state.starts.fetch_add(1, Ordering::SeqCst);
            self.state
                .serving()
                .insert(self.target.topic.clone(), self.dispatcher.clone());
            Ok(())
        })
    }

    fn stop(&mut self) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            if !self.released {
                self.released = true;
                self.state.stops.fetch_add(1, Ordering::SeqCst);
                self.state.serving().remove(&self.target.topic);
            }
            Ok(())
        })
    }
}
