use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use tether_core::config::EndpointConfig;
use tether_core::endpoint::{
    Endpoint, EndpointFuture, EndpointTransport, Listener, RpcError, RpcRequest, RpcResponse,
    Target,
};
use tether_core::TetherError;

use super::dispatcher::Dispatcher;

/// How long `stop` waits for open requests before dropping the server.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport serving endpoints as JSON over HTTP.
///
/// Requests for any node of a topic go to `POST /rpc/{topic}`; requests
/// for this node only go to `POST /rpc/{topic}/{server}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    listen: String,
    port: u16,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(listen: impl Into<String>, port: u16) -> Self {
        Self {
            listen: listen.into(),
            port,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(config.listen.clone(), config.port)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl EndpointTransport for HttpTransport {
    fn bind(
        &self,
        target: Target,
        endpoints: Vec<Arc<dyn Endpoint>>,
    ) -> EndpointFuture<'_, Box<dyn Listener>> {
        Box::pin(async move {
            let bind_error = |e: std::io::Error| {
                TetherError::EndpointBindFailure(format!("{}:{}: {}", self.listen, self.port, e))
            };

            let socket = TcpListener::bind((self.listen.as_str(), self.port))
                .await
                .map_err(bind_error)?;
            let local_addr = socket.local_addr().map_err(bind_error)?;

            let state = RpcState {
                dispatcher: Dispatcher::new(endpoints),
                request_timeout: self.request_timeout,
            };
            let router = rpc_router(&target, state);

            tracing::debug!(target = %target, addr = %local_addr, "Endpoint bound");

            Ok(Box::new(HttpListener {
                target,
                local_addr,
                pending: Some((socket, router)),
                shutdown: None,
                server: None,
            }) as Box<dyn Listener>)
        })
    }
}

/// Listener created by [`HttpTransport`].
pub struct HttpListener {
    target: Target,
    local_addr: SocketAddr,
    pending: Option<(TcpListener, Router)>,
    shutdown: Option<CancellationToken>,
    server: Option<JoinHandle<()>>,
}

impl Listener for HttpListener {
    fn start(&mut self) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            let Some((socket, router)) = self.pending.take() else {
                if self.server.is_some() {
                    return Ok(());
                }
                return Err(TetherError::InvalidState(format!(
                    "Listener for {} was stopped",
                    self.target
                )));
            };

            let token = CancellationToken::new();
            let shutdown = token.clone();
            let target = self.target.clone();

            self.server = Some(tokio::spawn(async move {
                let result = axum::serve(socket, router)
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await;
                if let Err(e) = result {
                    tracing::error!(target = %target, "Endpoint server error: {}", e);
                }
            }));
            self.shutdown = Some(token);

            tracing::info!(target = %self.target, addr = %self.local_addr, "Endpoint listening");
            Ok(())
        })
    }

    fn stop(&mut self) -> EndpointFuture<'_, ()> {
        Box::pin(async move {
            self.pending = None;

            if let Some(token) = self.shutdown.take() {
                token.cancel();
            }

            if let Some(mut server) = self.server.take() {
                if tokio::time::timeout(DRAIN_TIMEOUT, &mut server).await.is_err() {
                    tracing::warn!(target = %self.target, "Endpoint did not drain in time");
                    server.abort();
                }
                tracing::debug!(target = %self.target, "Endpoint closed");
            }

            Ok(())
        })
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

#[derive(Clone)]
struct RpcState {
    dispatcher: Dispatcher,
    request_timeout: Duration,
}

fn rpc_router(target: &Target, state: RpcState) -> Router {
    Router::new()
        .route(&format!("/rpc/{}", target.topic), post(rpc_handler))
        .route(
            &format!("/rpc/{}/{}", target.topic, target.server),
            post(rpc_handler),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn rpc_handler(
    State(state): State<RpcState>,
    Json(request): Json<RpcRequest>,
) -> (StatusCode, Json<RpcResponse>) {
    let RpcRequest { method, args } = request;

    let result = match tokio::time::timeout(
        state.request_timeout,
        state.dispatcher.dispatch(&method, args),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            let error = RpcError::new("TIMEOUT", format!("Method '{}' timed out", method));
            return (StatusCode::GATEWAY_TIMEOUT, Json(RpcResponse::error(error)));
        }
    };

    match result {
        Ok(data) => (StatusCode::OK, Json(RpcResponse::success(data))),
        Err(e) => {
            tracing::debug!(method = %method, error = %e, "Endpoint call failed");
            let error = RpcError::from(&e);
            (status_for(&error), Json(RpcResponse::error(error)))
        }
    }
}

fn status_for(error: &RpcError) -> StatusCode {
    match error.code.as_str() {
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "INVALID_ARGUMENT" => StatusCode::BAD_REQUEST,
        "UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
