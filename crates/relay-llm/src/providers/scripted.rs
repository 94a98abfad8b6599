//! Deterministic backend that replays queued replies
//!
//! Used for offline runs and tests. Once the script is exhausted the backend
//! echoes the last user message, so a pipeline still produces output.

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, ModelBackend, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Backend returning pre-recorded messages in order
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Message::assistant(text))
    }

    /// Queue a reply requesting one tool call
    pub fn tool_call(self, id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        self.push(Message::assistant_blocks(vec![ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }]))
    }

    fn push(self, message: Message) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn echo(request: &CompletionRequest) -> Message {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::text)
            .unwrap_or_default();
        Message::assistant(last_user)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let message = scripted.unwrap_or_else(|| Self::echo(&request));

        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let stop_reason = if message.has_tool_uses() {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        Ok(CompletionResponse {
            message,
            stop_reason,
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}
