use serde::{Deserialize, Serialize};

/// Endpoint listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Address to listen on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Port to listen on (0 picks a free port).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8776
}

fn default_request_timeout() -> u64 {
    30
}
