//! Conversation turns carried between requests of one session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One request/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub message: String,
    pub response: Value,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(message: impl Into<String>, response: Value) -> Self {
        Self {
            message: message.into(),
            response,
            at: Utc::now(),
        }
    }

    /// Response rendered as plain text
    pub fn response_text(&self) -> String {
        match &self.response {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
