//! Tool trait definition

use async_trait::async_trait;
use relay_core::Result;
use relay_llm::ToolDefinition;
use serde_json::{Map, Value};

/// Trait for tools that units can execute
///
/// Tools are functions a unit (or the model driving it) can call to reach the
/// outside world. Each tool provides a name, a description and a JSON schema
/// for its input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    ///
    /// Errors returned here are never propagated past the calling unit; see
    /// [`invoke_captured`](crate::invoke_captured).
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Get the tool's name
    ///
    /// Must be unique within a [`ToolRegistry`](crate::ToolRegistry)
    fn name(&self) -> &str;

    /// Get the tool's description
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    ///
    /// ```
    /// use serde_json::json;
    ///
    /// let schema = json!({
    ///     "type": "object",
    ///     "properties": { "tickers_string": { "type": "string" } },
    ///     "required": ["tickers_string"]
    /// });
    /// ```
    fn input_schema(&self) -> Value;

    /// Fields of the input that identify a call in a captured failure
    ///
    /// Defaults to every top-level field of an object input.
    fn identifying_fields(&self, params: &Value) -> Map<String, Value> {
        match params {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}
