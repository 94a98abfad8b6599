//! OpenAI-compatible chat completions backend
//!
//! Works against api.openai.com as well as local servers exposing the same
//! `/chat/completions` surface (LM Studio, vLLM, llama.cpp).
//!
//! ```no_run
//! use relay_llm::providers::OpenAiBackend;
//! use relay_llm::{CompletionRequest, Message, ModelBackend};
//! use relay_utils::Settings;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = OpenAiBackend::from_settings(&Settings::from_env()?)?;
//! let request = CompletionRequest::builder(backend.default_model())
//!     .add_message(Message::user("Resuma o mercado de FIIs"))
//!     .build();
//! let response = backend.complete(request).await?;
//! println!("{}", response.message.text());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, Message, MessageContent,
    ModelBackend, Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use relay_utils::Settings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for [`OpenAiBackend`]
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            api_base: api_base.into(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl From<&Settings> for OpenAiConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_base: settings.api_base.clone(),
            model: settings.model.clone(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Backend speaking the OpenAI chat completions protocol
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn with_config(config: OpenAiConfig) -> Result<Self> {
        if config.api_base.trim().is_empty() {
            return Err(LlmError::Configuration("api_base must not be empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::with_config(OpenAiConfig::from(settings))
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: to_wire_messages(request.system, request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: (!request.tools.is_empty()).then(|| to_wire_tools(&request.tools)),
        };

        let mut http = self.client.post(self.config.completions_url()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimitExceeded(text),
                400 => LlmError::InvalidRequest(text),
                404 => LlmError::ModelNotFound(request.model),
                _ => LlmError::RequestFailed(format!("HTTP {status}: {text}")),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::UnexpectedResponse("No choices in response".to_string()))?;

        let usage = parsed.usage.unwrap_or_default();
        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion received"
        );

        let message = from_wire_message(choice.message)?;
        let stop_reason = if message.has_tool_uses() {
            StopReason::ToolUse
        } else {
            stop_reason(choice.finish_reason.as_deref())
        };

        Ok(CompletionResponse {
            message,
            stop_reason,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }
}

// Wire format

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

fn function_type() -> String {
    "function".to_string()
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

/// System prompt first, then each message; tool results become `tool` messages
fn to_wire_messages(system: Option<String>, messages: Vec<Message>) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system {
        wire.push(WireMessage::text("system", system));
    }

    for message in messages {
        let role = role_name(message.role);
        let blocks = match message.content {
            MessageContent::Text(text) => {
                wire.push(WireMessage::text(role, text));
                continue;
            }
            MessageContent::Blocks(blocks) => blocks,
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut results = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(WireToolCall {
                    id,
                    kind: function_type(),
                    function: WireFunctionCall {
                        name,
                        arguments: input.to_string(),
                    },
                }),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => results.push(WireMessage {
                    role: "tool",
                    content: Some(content),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(tool_use_id),
                }),
            }
        }

        if !text.is_empty() || !tool_calls.is_empty() {
            wire.push(WireMessage {
                role,
                content: (!text.is_empty()).then_some(text),
                tool_calls,
                tool_call_id: None,
            });
        }
        wire.extend(results);
    }
    wire
}

fn to_wire_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| WireTool {
            kind: "function",
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

fn from_wire_message(message: WireResponseMessage) -> Result<Message> {
    let mut blocks = Vec::new();
    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        blocks.push(ContentBlock::Text { text });
    }
    for call in message.tool_calls {
        // Some servers send an empty string for argument-less calls
        let input = if call.function.arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                LlmError::UnexpectedResponse(format!("Failed to parse tool arguments: {e}"))
            })?
        };
        blocks.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }
    Ok(Message::assistant_blocks(blocks))
}

fn stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") => StopReason::ToolUse,
        Some("stop") | None => StopReason::EndTurn,
        Some(other) => {
            debug!(reason = other, "treating unknown finish reason as end of turn");
            StopReason::EndTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::with_config(
            OpenAiConfig::new("http://localhost:1234/v1/", "local-model").with_api_key("k"),
        )
        .unwrap()
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            model: "gpt-4o".to_string(),
            ..Settings::default()
        };
        let backend = OpenAiBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.name(), "openai");
        assert_eq!(backend.default_model(), "gpt-4o");
        assert!(backend.config().api_key.is_none());
    }

    #[test]
    fn test_empty_api_base_rejected() {
        let result = OpenAiBackend::with_config(OpenAiConfig::new(" ", "m"));
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_completions_url_trims_slash() {
        assert_eq!(
            backend().config().completions_url(),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_system_prompt_goes_first() {
        let wire = to_wire_messages(Some("sys".to_string()), vec![Message::user("oi")]);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].content.as_deref(), Some("oi"));
    }

    #[test]
    fn test_tool_round_trip_messages() {
        let assistant = Message::assistant_blocks(vec![ContentBlock::ToolUse {
            id: "call_1".to_string(),
            name: "get_fii_data".to_string(),
            input: json!({"tickers_string": "HGLG11"}),
        }]);
        let results = Message::tool_results(vec![ContentBlock::ToolResult {
            tool_use_id: "call_1".to_string(),
            content: "{}".to_string(),
            is_error: false,
        }]);

        let wire = to_wire_messages(None, vec![assistant, results]);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, "assistant");
        assert!(wire[0].content.is_none());
        assert_eq!(wire[0].tool_calls[0].function.name, "get_fii_data");
        assert_eq!(wire[1].role, "tool");
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "get_fii_data", "arguments": "{\"tickers_string\":\"XPML11\"}"}
            }]
        });
        let message: WireResponseMessage = serde_json::from_value(raw).unwrap();
        let message = from_wire_message(message).unwrap();

        let uses = message.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].2["tickers_string"], "XPML11");
    }

    #[test]
    fn test_empty_arguments_become_object() {
        let message = WireResponseMessage {
            content: None,
            tool_calls: vec![WireToolCall {
                id: "c".to_string(),
                kind: function_type(),
                function: WireFunctionCall {
                    name: "now".to_string(),
                    arguments: String::new(),
                },
            }],
        };
        let message = from_wire_message(message).unwrap();
        assert_eq!(message.tool_uses()[0].2, &json!({}));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(stop_reason(Some("stop")), StopReason::EndTurn);
        assert_eq!(stop_reason(Some("length")), StopReason::MaxTokens);
        assert_eq!(stop_reason(Some("tool_calls")), StopReason::ToolUse);
        assert_eq!(stop_reason(Some("content_filter")), StopReason::EndTurn);
        assert_eq!(stop_reason(None), StopReason::EndTurn);
    }
}
