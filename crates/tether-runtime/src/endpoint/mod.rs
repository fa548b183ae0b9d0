mod client;
mod dispatcher;
mod http;

pub use client::RpcClient;
pub use dispatcher::Dispatcher;
pub use http::{HttpListener, HttpTransport};
