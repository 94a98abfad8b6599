//! Closure-backed deterministic unit

use async_trait::async_trait;
use relay_core::{Result, UnitContext, UnitInputs, UnitSpec, WorkerUnit};
use serde_json::Value;

type UnitFn = Box<dyn Fn(&str, &UnitInputs) -> Result<Value> + Send + Sync>;

/// A unit computed by a synchronous function of the query and inputs
///
/// Useful for extraction and formatting steps that need no model.
pub struct FnUnit {
    spec: UnitSpec,
    f: UnitFn,
}

impl FnUnit {
    pub fn new<F>(spec: UnitSpec, f: F) -> Self
    where
        F: Fn(&str, &UnitInputs) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            spec,
            f: Box::new(f),
        }
    }
}

#[async_trait]
impl WorkerUnit for FnUnit {
    fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    async fn run(&self, query: &str, inputs: &UnitInputs, ctx: &UnitContext) -> Result<Value> {
        ctx.ensure_active()?;
        (self.f)(query, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{CancellationToken, EventEmitter};
    use serde_json::json;

    #[tokio::test]
    async fn test_runs_function() {
        let unit = FnUnit::new(UnitSpec::builder("upper").build(), |query, _| {
            Ok(json!(query.to_uppercase()))
        });
        let (emitter, _rx) = EventEmitter::channel("r");
        let ctx = UnitContext::new(emitter, CancellationToken::new());

        let value = unit.run("fii", &UnitInputs::empty(), &ctx).await.unwrap();
        assert_eq!(value, json!("FII"));
        assert_eq!(unit.name(), "upper");
    }
}
