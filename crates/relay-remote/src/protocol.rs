//! Request/response bodies exchanged with remote worker services

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a task request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl TaskRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Outcome reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Body of a task response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub agent: String,
    pub session_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResponse {
    pub fn completed(agent: impl Into<String>, session_id: impl Into<String>, result: Value) -> Self {
        Self {
            agent: agent.into(),
            session_id: session_id.into(),
            status: TaskStatus::Completed,
            result,
            error: None,
        }
    }

    pub fn failed(agent: impl Into<String>, session_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            session_id: session_id.into(),
            status: TaskStatus::Failed,
            result: Value::Null,
            error: Some(error.into()),
        }
    }

    /// The result as plain text
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_session() {
        let request: TaskRequest = serde_json::from_value(json!({"message": "oi"})).unwrap();
        assert_eq!(request.session_id, None);
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"message": "oi"}));
    }

    #[test]
    fn test_failed_response_shape() {
        let response = TaskResponse::failed("content_agent", "s1", "model unavailable");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "model unavailable");
        assert!(value["result"].is_null());
    }
}
