use std::sync::Arc;

use serde_json::Value;
use tether_core::endpoint::Endpoint;
use tether_core::{Result, TetherError};

/// Routes method calls to the endpoints bound for a service.
#[derive(Clone)]
pub struct Dispatcher {
    endpoints: Arc<Vec<Arc<dyn Endpoint>>>,
}

impl Dispatcher {
    /// Create a dispatcher. Earlier endpoints win when several handle a method.
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
        }
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether there are no endpoints.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Whether some endpoint handles `method`.
    pub fn has_method(&self, method: &str) -> bool {
        self.resolve(method).is_some()
    }

    /// Invoke `method` on the endpoint that handles it.
    pub async fn dispatch(&self, method: &str, args: Value) -> Result<Value> {
        let (endpoint, local) = self
            .resolve(method)
            .ok_or_else(|| TetherError::NotFound(format!("Method '{}' not found", method)))?;

        endpoint.call(local, args).await
    }

    fn resolve<'m>(&self, method: &'m str) -> Option<(&Arc<dyn Endpoint>, &'m str)> {
        self.endpoints.iter().find_map(|endpoint| {
            let local = match endpoint.namespace() {
                Some(namespace) => method
                    .strip_prefix(namespace)
                    .and_then(|rest| rest.strip_prefix('.'))?,
                None => method,
            };
            endpoint.handles(local).then_some((endpoint, local))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::endpoint::EndpointFuture;

    struct Echo {
        namespace: Option<&'static str>,
        tag: &'static str,
    }

    impl Endpoint for Echo {
        fn namespace(&self) -> Option<&str> {
            self.namespace
        }

        fn handles(&self, method: &str) -> bool {
            method == "echo"
        }

        fn call<'a>(&'a self, _method: &'a str, args: Value) -> EndpointFuture<'a, Value> {
            Box::pin(async move { Ok(serde_json::json!({ "tag": self.tag, "args": args })) })
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(vec![
            Arc::new(Echo {
                namespace: None,
                tag: "primary",
            }),
            Arc::new(Echo {
                namespace: Some("admin"),
                tag: "admin",
            }),
            Arc::new(Echo {
                namespace: None,
                tag: "shadowed",
            }),
        ])
    }

    #[tokio::test]
    async fn test_first_endpoint_wins() {
        let result = dispatcher()
            .dispatch("echo", serde_json::json!(1))
            .await
            .unwrap();
        assert_eq!(result["tag"], "primary");
        assert_eq!(result["args"], 1);
    }

    #[tokio::test]
    async fn test_namespaced_method() {
        let result = dispatcher()
            .dispatch("admin.echo", Value::Null)
            .await
            .unwrap();
        assert_eq!(result["tag"], "admin");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let dispatcher = dispatcher();
        assert!(!dispatcher.has_method("resize"));
        assert!(!dispatcher.has_method("admin.resize"));
        let result = dispatcher.dispatch("resize", Value::Null).await;
        assert!(matches!(result, Err(TetherError::NotFound(_))));
    }
}
