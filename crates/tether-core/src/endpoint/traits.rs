use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::Result;

/// Boxed future returned by endpoint operations.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Where a listener receives requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Logical channel shared by every node serving the topic.
    pub topic: String,
    /// Host name used for requests addressed to this node only.
    pub server: String,
}

impl Target {
    pub fn new(topic: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            server: server.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.topic, self.server)
    }
}

/// Handler for methods invoked through the endpoint.
pub trait Endpoint: Send + Sync + 'static {
    /// Optional namespace; a namespaced endpoint answers `namespace.method`.
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Whether this endpoint implements `method`.
    fn handles(&self, method: &str) -> bool;

    /// Invoke `method` with JSON arguments.
    fn call<'a>(&'a self, method: &'a str, args: Value) -> EndpointFuture<'a, Value>;
}

/// A bound request listener.
pub trait Listener: Send + Sync {
    /// Begin delivering requests.
    fn start(&mut self) -> EndpointFuture<'_, ()>;

    /// Stop delivering requests. Safe to call more than once.
    fn stop(&mut self) -> EndpointFuture<'_, ()>;

    /// Address the listener is bound to, when it has one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Transport that carries remote requests to endpoints.
pub trait EndpointTransport: Send + Sync + 'static {
    /// Bind a listener for `target` that dispatches to `endpoints`.
    ///
    /// Failures are reported as `TetherError::EndpointBindFailure`.
    fn bind(
        &self,
        target: Target,
        endpoints: Vec<Arc<dyn Endpoint>>,
    ) -> EndpointFuture<'_, Box<dyn Listener>>;
}
