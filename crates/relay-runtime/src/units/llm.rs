//! Model-driven unit (wraps UnitExecutor)

use crate::executor::UnitExecutor;
use crate::prompt::{render_instruction, user_message, validate_instruction};
use async_trait::async_trait;
use relay_core::{Result, UnitContext, UnitInputs, UnitSpec, WorkerUnit};
use relay_llm::Message;
use serde_json::Value;
use tracing::debug;

/// A unit whose result is produced by the model loop
///
/// The instruction becomes the system prompt; the query and declared inputs
/// form the user turn, preceded by any session history. When every declared
/// input is missing the unit has nothing to work on and returns an empty
/// result without calling the model.
pub struct LlmUnit {
    spec: UnitSpec,
    executor: UnitExecutor,
}

impl LlmUnit {
    pub fn new(spec: UnitSpec, executor: UnitExecutor) -> Result<Self> {
        validate_instruction(&spec)?;
        Ok(Self { spec, executor })
    }

    pub fn executor(&self) -> &UnitExecutor {
        &self.executor
    }
}

#[async_trait]
impl WorkerUnit for LlmUnit {
    fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    async fn run(&self, query: &str, inputs: &UnitInputs, ctx: &UnitContext) -> Result<Value> {
        if inputs.all_missing() {
            debug!(unit = %self.spec.name, missing = ?inputs.missing_keys(), "all inputs missing; skipping model call");
            return Ok(Value::Null);
        }

        let system = render_instruction(&self.spec, query, inputs)?;
        let mut conversation: Vec<Message> =
            ctx.history.iter().flat_map(Message::from_turn).collect();
        conversation.push(Message::user(user_message(query, inputs)));

        let text = self.executor.run(&system, conversation, ctx).await?;
        Ok(Value::String(text))
    }
}
