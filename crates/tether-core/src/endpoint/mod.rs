mod message;
mod traits;

pub use message::{RpcError, RpcRequest, RpcResponse};
pub use traits::{Endpoint, EndpointFuture, EndpointTransport, Listener, Target};
