use serde::{Deserialize, Serialize};

use crate::TetherError;

/// Request body for a method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Method name to invoke.
    pub method: String,
    /// Method arguments as JSON.
    #[serde(default)]
    pub args: serde_json::Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Response body for a method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Result data (if successful).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error information (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: RpcError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Convert into the call result.
    pub fn into_result(self) -> crate::Result<serde_json::Value> {
        match self.error {
            Some(error) if !self.success => Err(error.into()),
            _ => Ok(self.data.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Error information carried in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl RpcError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&TetherError> for RpcError {
    fn from(e: &TetherError) -> Self {
        let code = match e {
            TetherError::NotFound(_) => "NOT_FOUND",
            TetherError::InvalidArgument(_) | TetherError::Serialization(_) => "INVALID_ARGUMENT",
            TetherError::DirectoryUnavailable(_) => "UNAVAILABLE",
            _ => "INTERNAL_ERROR",
        };
        Self::new(code, e.to_string())
    }
}

impl From<RpcError> for TetherError {
    fn from(e: RpcError) -> Self {
        match e.code.as_str() {
            "NOT_FOUND" => TetherError::NotFound(e.message),
            "INVALID_ARGUMENT" => TetherError::InvalidArgument(e.message),
            _ => TetherError::Endpoint(e.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_default_args() {
        let req: RpcRequest = serde_json::from_str(r#"{"method": "ping"}"#).unwrap();
        assert_eq!(req.method, "ping");
        assert!(req.args.is_null());
    }

    #[test]
    fn test_error_response_into_result() {
        let err = TetherError::NotFound("no method 'resize'".into());
        let response = RpcResponse::error(RpcError::from(&err));
        assert_eq!(response.error.as_ref().unwrap().code, "NOT_FOUND");

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"data\""));

        let result = response.into_result();
        assert!(matches!(result, Err(TetherError::NotFound(_))));
    }

    #[test]
    fn test_success_response_into_result() {
        let response = RpcResponse::success(serde_json::json!({"pong": true}));
        assert_eq!(response.into_result().unwrap()["pong"], true);
    }
}
