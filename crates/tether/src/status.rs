use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde_json::{json, Value};

use tether_core::endpoint::{Endpoint, EndpointFuture};
use tether_core::{Manager, ManagerContext, TetherError};

/// Built-in manager reporting on the node it runs on.
///
/// Methods: `ping` returns `"pong"`, `describe` returns host, service name,
/// version, uptime and the number of periodic ticks so far.
pub struct StatusManager {
    host: String,
    service_name: Option<String>,
    started: Instant,
    ticks: AtomicU64,
}

impl StatusManager {
    pub fn new(context: &ManagerContext) -> Self {
        Self {
            host: context.host.clone(),
            service_name: context.service_name.clone(),
            started: Instant::now(),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn describe(&self) -> Value {
        json!({
            "host": self.host,
            "service_name": self.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": self.started.elapsed().as_secs(),
            "ticks": self.ticks(),
        })
    }
}

impl Endpoint for StatusManager {
    fn handles(&self, method: &str) -> bool {
        matches!(method, "ping" | "describe")
    }

    fn call<'a>(&'a self, method: &'a str, _args: Value) -> EndpointFuture<'a, Value> {
        Box::pin(async move {
            match method {
                "ping" => Ok(Value::from("pong")),
                "describe" => Ok(self.describe()),
                other => Err(TetherError::NotFound(format!(
                    "Method '{}' not found",
                    other
                ))),
            }
        })
    }
}

impl Manager for StatusManager {
    fn periodic_tick(&self, _raise_on_error: bool) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::trace!(host = %self.host, ticks, "Status tick");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> StatusManager {
        StatusManager::new(&ManagerContext {
            host: "h1".to_string(),
            service_name: Some("status".to_string()),
        })
    }

    #[tokio::test]
    async fn test_ping() {
        let status = manager();
        assert!(status.handles("ping"));
        assert_eq!(status.call("ping", Value::Null).await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_describe_counts_ticks() {
        let status = manager();
        status.periodic_tick(false).await.unwrap();
        status.periodic_tick(true).await.unwrap();

        let description = status.call("describe", Value::Null).await.unwrap();
        assert_eq!(description["host"], "h1");
        assert_eq!(description["service_name"], "status");
        assert_eq!(description["ticks"], 2);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let status = manager();
        assert!(!status.handles("resize"));
        let result = status.call("resize", Value::Null).await;
        assert!(matches!(result, Err(TetherError::NotFound(_))));
    }
}
