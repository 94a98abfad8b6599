//! Closure-backed tools

use crate::Tool;
use async_trait::async_trait;
use futures::future::BoxFuture;
use relay_core::Result;
use serde_json::{Value, json};
use std::future::Future;

type Handler = Box<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A tool whose behaviour is an async closure
///
/// ```
/// use relay_tools::FnTool;
/// use serde_json::json;
///
/// let upper = FnTool::new("upper", "Uppercase text", |params| async move {
///     let text = params["text"].as_str().unwrap_or_default().to_uppercase();
///     Ok(json!(text))
/// });
/// ```
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: Handler,
}

impl FnTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({ "type": "object" }),
            handler: Box::new(move |params| -> BoxFuture<'static, Result<Value>> {
                Box::pin(handler(params))
            }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        (self.handler)(params).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Error;

    #[tokio::test]
    async fn test_executes_closure() {
        let tool = FnTool::new("double", "Doubles n", |params| async move {
            let n = params["n"].as_i64().ok_or_else(|| Error::Generic("n missing".into()))?;
            Ok(json!(n * 2))
        });

        assert_eq!(tool.execute(json!({"n": 21})).await.unwrap(), json!(42));
        assert!(tool.execute(json!({})).await.is_err());
        assert_eq!(tool.definition().name, "double");
    }
}
