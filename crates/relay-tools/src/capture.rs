//! Tool invocation with captured failures
//!
//! A failing tool never aborts the unit that called it. The failure becomes a
//! structured value `{ "error": message, ..identifying fields }` which is
//! recorded as a function response and handed back like any other result.

use crate::{Tool, ToolRegistry};
use relay_core::EventEmitter;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Result of one captured invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// Tool output, or the captured failure payload
    pub value: Value,
    /// Whether `value` is a captured failure
    pub failed: bool,
}

/// Build the captured failure payload
///
/// Identifying fields never override the `error` key.
pub fn failure_payload(message: impl Into<String>, identifying: Map<String, Value>) -> Value {
    let mut payload = identifying;
    payload.insert("error".to_string(), Value::String(message.into()));
    Value::Object(payload)
}

/// Whether a value is a captured failure payload
pub fn is_failure(value: &Value) -> bool {
    value.get("error").is_some_and(|e| !e.is_null())
}

/// Invoke a tool, emitting call and response events, and capture any failure
pub async fn invoke_captured(tool: &dyn Tool, params: Value, events: &EventEmitter) -> ToolOutcome {
    events.function_call(tool.name(), params.clone());
    debug!(tool = tool.name(), "invoking tool");

    let identifying = tool.identifying_fields(&params);
    let outcome = match tool.execute(params).await {
        Ok(value) => ToolOutcome {
            failed: is_failure(&value),
            value,
        },
        Err(err) => {
            warn!(tool = tool.name(), error = %err, "tool failed; capturing");
            ToolOutcome {
                value: failure_payload(err.to_string(), identifying),
                failed: true,
            }
        }
    };

    events.function_response(tool.name(), outcome.value.clone());
    outcome
}

/// Look a tool up by name and invoke it; unknown names are captured failures
pub async fn invoke_by_name(
    registry: &ToolRegistry,
    name: &str,
    params: Value,
    events: &EventEmitter,
) -> ToolOutcome {
    match registry.get(name) {
        Some(tool) => invoke_captured(tool.as_ref(), params, events).await,
        None => {
            warn!(tool = name, "unknown tool requested");
            events.function_call(name, params.clone());
            let value = failure_payload(format!("Unknown tool: {name}"), Map::new());
            events.function_response(name, value.clone());
            ToolOutcome {
                value,
                failed: true,
            }
        }
    }
}
