//! Pipelines used as units of an enclosing pipeline

use async_trait::async_trait;
use relay_core::{
    Error, Input, PipelineState, Result, UnitContext, UnitInputs, UnitSpec, WorkerUnit,
};
use serde_json::Value;
use tracing::instrument;

use crate::pipeline::SequentialPipeline;
use crate::run::{RunOptions, RunStatus};

/// A whole pipeline presented as a single unit
///
/// The inner stages share the outer run's event stream, so the trace shows
/// each inner stage under its own name. Only the inner pipeline's final
/// output is returned to the enclosing pipeline; intermediate keys stay in a
/// private state.
pub struct PipelineUnit {
    spec: UnitSpec,
    pipeline: SequentialPipeline,
}

impl PipelineUnit {
    /// Wrap a pipeline; its external inputs become the unit's inputs and its
    /// output key becomes the unit's output key
    pub fn new(pipeline: SequentialPipeline) -> Self {
        let mut spec = UnitSpec::builder(pipeline.name()).description(pipeline.description());
        for key in pipeline.external_inputs() {
            spec = spec.input(key.clone());
        }
        if let Some(key) = pipeline.output_key() {
            spec = spec.output_key(key);
        }
        Self {
            spec: spec.build(),
            pipeline,
        }
    }

    /// Publish the inner output under a different key
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.spec.output_key = Some(key.into());
        self
    }

    pub fn pipeline(&self) -> &SequentialPipeline {
        &self.pipeline
    }
}

#[async_trait]
impl WorkerUnit for PipelineUnit {
    fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    #[instrument(skip(self, inputs, ctx), fields(pipeline = %self.pipeline.name()))]
    async fn run(&self, query: &str, inputs: &UnitInputs, ctx: &UnitContext) -> Result<Value> {
        let mut state = PipelineState::new();
        for (key, input) in inputs.iter() {
            if let Input::Present(value) = input {
                state.publish(key, value.clone())?;
            }
        }

        let mut options = RunOptions::new().with_cancel(ctx.cancel.child_token());
        if let Some(session_id) = &ctx.session_id {
            options = options.with_session(session_id.clone(), ctx.history.clone());
        }

        let execution = self
            .pipeline
            .execute(query, &mut state, &ctx.events, &options)
            .await;

        match execution.status {
            RunStatus::Completed => Ok(self
                .pipeline
                .output_key()
                .and_then(|key| state.get(key))
                .cloned()
                .unwrap_or(Value::Null)),
            RunStatus::Cancelled => Err(Error::Cancelled),
            _ => Err(Error::ProcessingFailed(
                execution
                    .failure
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| format!("pipeline '{}' did not complete", self.pipeline.name())),
            )),
        }
    }
}
