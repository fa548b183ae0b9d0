use thiserror::Error;

/// Core error type for tether operations.
#[derive(Error, Debug)]
pub enum TetherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Directory record missing: {0}")]
    RecordMissing(String),

    #[error("Failed to bind endpoint: {0}")]
    EndpointBindFailure(String),

    #[error("Endpoint error: {0}")]
    Endpoint(String),

    #[error("Periodic task failed: {0}")]
    DomainTaskFailure(String),

    #[error("Manager error: {0}")]
    Manager(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TetherError {
    /// Whether the failure is expected to clear up on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DirectoryUnavailable(_) | Self::RecordMissing(_))
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(e: serde_json::Error) -> Self {
        TetherError::Serialization(e.to_string())
    }
}

/// Result type alias using TetherError.
pub type Result<T> = std::result::Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(TetherError::DirectoryUnavailable("down".into()).is_transient());
        assert!(TetherError::RecordMissing("gone".into()).is_transient());
        assert!(!TetherError::EndpointBindFailure("in use".into()).is_transient());
        assert!(!TetherError::InvalidConfiguration("bad".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = TetherError::EndpointBindFailure("address in use".into());
        assert_eq!(err.to_string(), "Failed to bind endpoint: address in use");
    }
}
