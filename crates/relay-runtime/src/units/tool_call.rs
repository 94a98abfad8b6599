//! Deterministic unit that makes exactly one tool call

use async_trait::async_trait;
use relay_core::{Error, Input, Result, UnitContext, UnitInputs, UnitSpec, WorkerUnit};
use relay_tools::{Tool, invoke_captured};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Where the tool's single argument comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentSource {
    /// The run's query
    Query,
    /// A declared input key
    Input(String),
}

/// Calls one tool with one argument and returns its (possibly captured) output
///
/// The argument is passed as `{ param: text }`. A missing input means there
/// is nothing to look up, so the unit returns an empty result.
pub struct ToolCallUnit {
    spec: UnitSpec,
    tool: Arc<dyn Tool>,
    source: ArgumentSource,
    param: String,
}

impl ToolCallUnit {
    pub fn new(
        spec: UnitSpec,
        tool: Arc<dyn Tool>,
        source: ArgumentSource,
        param: impl Into<String>,
    ) -> Result<Self> {
        if let ArgumentSource::Input(key) = &source {
            if !spec.input_keys.contains(key) {
                return Err(Error::InitializationFailed(format!(
                    "unit '{}' reads '{key}' but does not declare it as an input",
                    spec.name
                )));
            }
        }
        Ok(Self {
            spec,
            tool,
            source,
            param: param.into(),
        })
    }
}

#[async_trait]
impl WorkerUnit for ToolCallUnit {
    fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    async fn run(&self, query: &str, inputs: &UnitInputs, ctx: &UnitContext) -> Result<Value> {
        let argument = match &self.source {
            ArgumentSource::Query => query.to_string(),
            ArgumentSource::Input(key) => match inputs.get(key) {
                Input::Missing => {
                    debug!(unit = %self.spec.name, key = %key, "input missing; no tool call");
                    return Ok(Value::Null);
                }
                present => present.as_text(),
            },
        };

        let mut params = Map::new();
        params.insert(self.param.clone(), Value::String(argument));

        let outcome = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(Error::Cancelled),
            outcome = invoke_captured(self.tool.as_ref(), Value::Object(params), &ctx.events) => outcome,
        };
        Ok(outcome.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{CancellationToken, EventEmitter, EventKind};
    use relay_tools::FnTool;
    use serde_json::json;

    fn tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new("lookup", "Lookup", |p| async move {
            match p["term"].as_str() {
                Some("boom") => Err(Error::ProcessingFailed("lookup failed".to_string())),
                Some(term) => Ok(json!({ "term": term, "hits": 3 })),
                None => Ok(Value::Null),
            }
        }))
    }

    fn spec() -> UnitSpec {
        UnitSpec::builder("buscador")
            .input("entidade")
            .output_key("pesquisa")
            .build()
    }

    #[test]
    fn test_undeclared_input_rejected() {
        let result = ToolCallUnit::new(spec(), tool(), ArgumentSource::Input("outra".into()), "term");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_calls_tool_with_input() {
        let unit = ToolCallUnit::new(spec(), tool(), ArgumentSource::Input("entidade".into()), "term")
            .unwrap();
        let (emitter, mut rx) = EventEmitter::channel("r");
        let ctx = UnitContext::new(emitter.for_author("buscador"), CancellationToken::new());
        let inputs = UnitInputs::from_pairs([("entidade".to_string(), Input::Present(json!("logística")))]);

        let result = unit.run("q", &inputs, &ctx).await.unwrap();
        assert_eq!(result["hits"], 3);
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::FunctionCall);
        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::FunctionResponse);
    }

    #[tokio::test]
    async fn test_failure_captured_and_missing_skipped() {
        let unit = ToolCallUnit::new(spec(), tool(), ArgumentSource::Query, "term").unwrap();
        let (emitter, _rx) = EventEmitter::channel("r");
        let ctx = UnitContext::new(emitter, CancellationToken::new());

        let failed = unit.run("boom", &UnitInputs::empty(), &ctx).await.unwrap();
        assert_eq!(failed["term"], "boom");
        assert!(failed["error"].as_str().unwrap().contains("lookup failed"));

        let by_input = ToolCallUnit::new(spec(), tool(), ArgumentSource::Input("entidade".into()), "term")
            .unwrap();
        let missing = UnitInputs::from_pairs([("entidade".to_string(), Input::Missing)]);
        assert!(by_input.run("q", &missing, &ctx).await.unwrap().is_null());
    }
}
