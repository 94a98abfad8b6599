//! Error types for relay-core

use thiserror::Error;

/// Result type alias for relay-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for unit and pipeline operations
///
/// Tool failures never appear here: they are captured into structured
/// payloads by the unit that invoked the tool. Remote transport errors are
/// converted into this type only when they escape a coordinator subtask.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Unit or pipeline construction failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Unit processing failed
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// Pipeline definition is inconsistent (duplicate names, unknown keys, ...)
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A declared input key was absent in strict mode
    #[error("Stage '{stage}' requires '{key}', which no earlier stage published")]
    MissingInput { stage: String, key: String },

    /// An attempt to overwrite a key within one run
    #[error("State key '{0}' was already published in this run")]
    KeyAlreadyPublished(String),

    /// Model backend failure
    #[error("Model error: {0}")]
    Model(String),

    /// Remote worker call failure that escaped its subtask
    #[error("Remote error: {0}")]
    Remote(String),

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is the result of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_display() {
        let err = Error::MissingInput {
            stage: "analista".to_string(),
            key: "tickers_string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Stage 'analista' requires 'tickers_string', which no earlier stage published"
        );
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Generic("x".to_string()).is_cancelled());
    }
}
