//! Tool definitions advertised to the model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, description and JSON schema of a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Small helpers for building JSON schemas
pub mod schema {
    use serde_json::{Value, json};

    /// Object schema with the given properties
    ///
    /// ```
    /// use relay_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({ "tickers_string": schema::string("Comma-separated FII tickers") }),
    ///     &["tickers_string"],
    /// );
    /// assert_eq!(schema["required"][0], "tickers_string");
    /// ```
    pub fn object(properties: Value, required: &[&str]) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn string(description: &str) -> Value {
        json!({ "type": "string", "description": description })
    }

    pub fn number(description: &str) -> Value {
        json!({ "type": "number", "description": description })
    }

    pub fn integer(description: &str) -> Value {
        json!({ "type": "integer", "description": description })
    }

    pub fn boolean(description: &str) -> Value {
        json!({ "type": "boolean", "description": description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition() {
        let input_schema = schema::object(json!({ "q": schema::string("Query") }), &["q"]);
        let tool = ToolDefinition::new("search", "Search the web", input_schema.clone());

        assert_eq!(tool.name, "search");
        assert_eq!(tool.input_schema, input_schema);
        assert_eq!(tool.input_schema["properties"]["q"]["type"], "string");
    }

    #[test]
    fn test_scalar_schemas() {
        assert_eq!(schema::number("n")["type"], "number");
        assert_eq!(schema::integer("i")["type"], "integer");
        assert_eq!(schema::boolean("b")["type"], "boolean");
    }
}
