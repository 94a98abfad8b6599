//! Error types for model backends

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors raised by a [`ModelBackend`](crate::ModelBackend)
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<LlmError> for relay_core::Error {
    fn from(err: LlmError) -> Self {
        relay_core::Error::Model(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_core_error() {
        let err: relay_core::Error = LlmError::RateLimitExceeded("slow down".to_string()).into();
        assert!(matches!(err, relay_core::Error::Model(ref m) if m.contains("slow down")));
    }
}
