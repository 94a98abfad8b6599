//! Error types for market data operations

use thiserror::Error;

/// Market data errors
#[derive(Debug, Error)]
pub enum FinanceError {
    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinance(String),

    /// No quote data for the symbol
    #[error("No data found for {0}")]
    NoData(String),

    /// Tool input could not be understood
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for market data operations
pub type Result<T> = std::result::Result<T, FinanceError>;

/// Convert FinanceError to relay_core::Error
impl From<FinanceError> for relay_core::Error {
    fn from(err: FinanceError) -> Self {
        relay_core::Error::ProcessingFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FinanceError::NoData("XPTO11.SA".to_string());
        assert_eq!(err.to_string(), "No data found for XPTO11.SA");
    }

    #[test]
    fn test_error_conversion() {
        let err: relay_core::Error = FinanceError::YahooFinance("timeout".to_string()).into();
        match err {
            relay_core::Error::ProcessingFailed(msg) => assert!(msg.contains("Yahoo Finance")),
            other => panic!("Expected ProcessingFailed, got {other:?}"),
        }
    }
}
