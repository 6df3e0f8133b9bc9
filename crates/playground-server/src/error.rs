//! Error types for the playground server.

use playground_core::PlaygroundError;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur in the playground server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The execution pipeline's infrastructure failed
    #[error("Pipeline failure: {0}")]
    Pipeline(#[from] PlaygroundError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a new invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert ServerError to HTTP status code
impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Json(_) => 400,
            // Infrastructure failures are gateway-class: the service is
            // fine, the container runtime behind it is not.
            ServerError::Pipeline(_) => 502,
            ServerError::Io(_) | ServerError::Config(_) | ServerError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playground_core::RunnerError;

    #[test]
    fn pipeline_failures_are_gateway_class() {
        let err = ServerError::from(PlaygroundError::RunnerError(RunnerError::RelayError(
            "daemon unreachable".into(),
        )));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn malformed_requests_are_client_errors() {
        assert_eq!(ServerError::invalid_request("bad body").status_code(), 400);
    }
}
