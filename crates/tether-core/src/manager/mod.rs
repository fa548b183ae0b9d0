use std::sync::Arc;

use crate::endpoint::{Endpoint, EndpointFuture};

/// What a manager is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerContext {
    /// Host the service runs on.
    pub host: String,
    /// Optional service name distinct from the topic.
    pub service_name: Option<String>,
}

/// Domain layer driven by a service runtime.
///
/// The manager is itself the primary endpoint of the service. Extra
/// endpoints returned by [`Manager::additional_endpoints`] are bound
/// alongside it.
pub trait Manager: Endpoint {
    /// Prepare local resources. Called once before the endpoint is bound.
    fn init_host(&self) -> EndpointFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Run the manager's periodic work once.
    ///
    /// With `raise_on_error` set, a failing subtask should return its error
    /// instead of logging it and moving on.
    fn periodic_tick(&self, raise_on_error: bool) -> EndpointFuture<'_, ()>;

    /// Endpoints served next to the manager.
    fn additional_endpoints(&self) -> Vec<Arc<dyn Endpoint>> {
        Vec::new()
    }
}
