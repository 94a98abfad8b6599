//! Unit executor for running model loops
//!
//! The UnitExecutor implements the model/tool loop behind an LLM unit:
//! 1. Call the model with the conversation and available tools
//! 2. If tool use was requested, invoke the tools (failures captured) and loop
//! 3. Otherwise return the model's text
//!
//! Every model call and tool call is raced against the unit's cancellation
//! token, and each tool invocation is recorded as a call/response event pair.

use relay_core::{Error, Result, UnitContext};
use relay_llm::{CompletionRequest, ContentBlock, Message, ModelBackend, StopReason};
use relay_tools::{ToolRegistry, invoke_by_name};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for the model loop
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum model calls per unit run
    pub max_iterations: usize,

    /// Model override; the backend's default is used when unset
    pub model: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            model: None,
            max_tokens: 4096,
            temperature: Some(0.3),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Drives a backend and a tool registry until the model stops asking for tools
#[derive(Clone)]
pub struct UnitExecutor {
    backend: Arc<dyn ModelBackend>,
    tools: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl UnitExecutor {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        tools: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            backend,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run the loop and return the model's final text
    pub async fn run(
        &self,
        system: &str,
        mut conversation: Vec<Message>,
        ctx: &UnitContext,
    ) -> Result<String> {
        let model = self
            .config
            .model
            .clone()
            .unwrap_or_else(|| self.backend.default_model().to_string());
        let tools = self.tools.definitions();

        for iteration in 1..=self.config.max_iterations {
            ctx.ensure_active()?;
            info!(
                unit = ctx.events.author(),
                "model iteration {iteration}/{}", self.config.max_iterations
            );

            let request = CompletionRequest::builder(model.as_str())
                .messages(conversation.clone())
                .system(system)
                .max_tokens(self.config.max_tokens)
                .temperature(self.config.temperature)
                .tools(tools.clone())
                .build();

            let response = tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                response = self.backend.complete(request) => response?,
            };
            debug!(stop_reason = ?response.stop_reason, tokens = response.usage.total(), "model replied");

            let message = response.message;
            if !message.has_tool_uses() {
                if response.stop_reason == StopReason::MaxTokens {
                    warn!(unit = ctx.events.author(), "model output truncated at token limit");
                }
                return Ok(message.text());
            }

            let text = message.text();
            if !text.trim().is_empty() {
                ctx.events.content(text);
            }

            let results = self.execute_tools(&message, ctx).await?;
            conversation.push(message);
            conversation.push(Message::tool_results(results));
        }

        warn!(
            unit = ctx.events.author(),
            "max iterations ({}) reached", self.config.max_iterations
        );
        Err(Error::ProcessingFailed(format!(
            "unit '{}' did not finish within {} model iterations",
            ctx.events.author(),
            self.config.max_iterations
        )))
    }

    /// Invoke requested tools in order; failures come back as error results
    async fn execute_tools(&self, message: &Message, ctx: &UnitContext) -> Result<Vec<ContentBlock>> {
        let mut results = Vec::new();
        for (id, name, input) in message.tool_uses() {
            info!(unit = ctx.events.author(), tool = name, "executing tool");
            let outcome = tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                outcome = invoke_by_name(&self.tools, name, input.clone(), &ctx.events) => outcome,
            };
            results.push(ContentBlock::ToolResult {
                tool_use_id: id.to_string(),
                content: outcome.value.to_string(),
                is_error: outcome.failed,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{CancellationToken, EventEmitter, EventKind};
    use relay_llm::providers::ScriptedBackend;
    use relay_tools::FnTool;
    use serde_json::json;

    fn context() -> (UnitContext, tokio::sync::mpsc::UnboundedReceiver<relay_core::ExecutionEvent>) {
        let (emitter, rx) = EventEmitter::channel("run");
        (
            UnitContext::new(emitter.for_author("analista"), CancellationToken::new()),
            rx,
        )
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new().with(Arc::new(FnTool::new(
            "get_fii_data",
            "Quotes",
            |p| async move { Ok(json!({"HGLG11": {"current_price": 160.0}, "args": p})) },
        ))))
    }

    #[tokio::test]
    async fn test_tool_loop_records_events() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .tool_call("c1", "get_fii_data", json!({"tickers_string": "HGLG11"}))
                .reply("HGLG11 negocia a 160"),
        );
        let executor = UnitExecutor::new(backend.clone(), registry(), ExecutorConfig::default());
        let (ctx, mut rx) = context();

        let text = executor
            .run("Analise", vec![Message::user("HGLG11")], &ctx)
            .await
            .unwrap();
        assert_eq!(text, "HGLG11 negocia a 160");

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec![EventKind::FunctionCall, EventKind::FunctionResponse]);

        // Second request carries the tool result back to the model
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .tool_call("c1", "google_search", json!({"q": "x"}))
                .reply("sem busca"),
        );
        let executor = UnitExecutor::new(backend.clone(), registry(), ExecutorConfig::default());
        let (ctx, _rx) = context();

        let text = executor.run("", vec![Message::user("x")], &ctx).await.unwrap();
        assert_eq!(text, "sem busca");

        let tool_turn = &backend.requests()[1].messages[2];
        match &tool_turn.content {
            relay_llm::MessageContent::Blocks(blocks) => assert!(matches!(
                blocks[0],
                ContentBlock::ToolResult { is_error: true, .. }
            )),
            relay_llm::MessageContent::Text(_) => panic!("expected tool result blocks"),
        }
    }

    #[tokio::test]
    async fn test_iteration_bound() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .tool_call("c1", "get_fii_data", json!({}))
                .tool_call("c2", "get_fii_data", json!({})),
        );
        let executor = UnitExecutor::new(
            backend,
            registry(),
            ExecutorConfig::default().with_max_iterations(2),
        );
        let (ctx, _rx) = context();

        let err = executor.run("", vec![Message::user("x")], &ctx).await.unwrap_err();
        assert!(matches!(err, Error::ProcessingFailed(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_model_call() {
        let backend = Arc::new(ScriptedBackend::new().reply("never"));
        let executor = UnitExecutor::new(backend.clone(), registry(), ExecutorConfig::default());
        let (ctx, _rx) = context();
        ctx.cancel.cancel();

        let err = executor.run("", vec![Message::user("x")], &ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(backend.requests().is_empty());
    }
}
