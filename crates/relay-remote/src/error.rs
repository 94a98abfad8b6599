//! Error types for remote delegation

use thiserror::Error;

/// Errors that can occur talking to a remote worker service
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The request did not complete within the configured timeout
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Could not connect to the service
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The service answered with a non-success HTTP status
    #[error("Remote service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The service completed the request but reported a failure
    #[error("Remote worker failed: {0}")]
    Rejected(String),

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Endpoint URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Other transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server could not be started
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Transient failures worth a retry: timeouts, refused connections and 5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::ConnectionFailed(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        let target = err.url().map_or_else(|| "remote".to_string(), ToString::to_string);
        if err.is_timeout() {
            Self::Timeout(target)
        } else if err.is_connect() {
            Self::ConnectionFailed(format!("{target}: {err}"))
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for RemoteError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Convert RemoteError to relay_core::Error
impl From<RemoteError> for relay_core::Error {
    fn from(err: RemoteError) -> Self {
        relay_core::Error::Remote(err.to_string())
    }
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RemoteError::Timeout("x".into()).is_retryable());
        assert!(RemoteError::ConnectionFailed("x".into()).is_retryable());
        assert!(
            RemoteError::Status {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !RemoteError::Status {
                status: 404,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!RemoteError::Rejected("bad input".into()).is_retryable());
        assert!(!RemoteError::InvalidUrl("x".into()).is_retryable());
    }

    #[test]
    fn test_into_core_error() {
        let err: relay_core::Error = RemoteError::Rejected("boom".into()).into();
        assert!(matches!(err, relay_core::Error::Remote(msg) if msg.contains("boom")));
    }
}
