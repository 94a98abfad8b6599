//! Core WorkerUnit trait definition

use crate::event::EventEmitter;
use crate::session::Turn;
use crate::{Result, UnitInputs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Static description of a worker unit
///
/// Immutable once the unit is built. `input_keys` are the state keys the unit
/// reads; `output_key` is where the pipeline publishes its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub input_keys: Vec<String>,
    pub output_key: Option<String>,
}

impl UnitSpec {
    /// Start describing a unit with the given name
    pub fn builder(name: impl Into<String>) -> UnitSpecBuilder {
        UnitSpecBuilder {
            spec: UnitSpec {
                name: name.into(),
                description: String::new(),
                instruction: String::new(),
                input_keys: Vec::new(),
                output_key: None,
            },
        }
    }

    /// First line of the description, used for labels
    pub fn summary(&self) -> &str {
        self.description.lines().next().unwrap_or_default().trim()
    }
}

/// Builder for [`UnitSpec`]
#[derive(Debug, Clone)]
pub struct UnitSpecBuilder {
    spec: UnitSpec,
}

impl UnitSpecBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = description.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.spec.instruction = instruction.into();
        self
    }

    /// Declare a state key this unit reads
    pub fn input(mut self, key: impl Into<String>) -> Self {
        self.spec.input_keys.push(key.into());
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.spec.output_key = Some(key.into());
        self
    }

    pub fn build(self) -> UnitSpec {
        self.spec
    }
}

/// Per-invocation context handed to a unit
#[derive(Debug, Clone)]
pub struct UnitContext {
    /// Emitter bound to this unit's name
    pub events: EventEmitter,
    /// Cancelled when the enclosing run is cancelled
    pub cancel: CancellationToken,
    /// Session the request belongs to, if any
    pub session_id: Option<String>,
    /// Earlier turns of the session, oldest first
    pub history: Vec<Turn>,
}

impl UnitContext {
    pub fn new(events: EventEmitter, cancel: CancellationToken) -> Self {
        Self {
            events,
            cancel,
            session_id: None,
            history: Vec::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>, history: Vec<Turn>) -> Self {
        self.session_id = Some(session_id.into());
        self.history = history;
        self
    }

    /// Same context with events attributed to another author
    pub fn for_unit(&self, name: &str) -> Self {
        Self {
            events: self.events.for_author(name),
            cancel: self.cancel.clone(),
            session_id: self.session_id.clone(),
            history: self.history.clone(),
        }
    }

    /// Fail fast if the run was cancelled
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Core trait that all worker units implement
///
/// A unit consumes the query and its resolved inputs and returns a result
/// value. It never touches pipeline state: publication under `output_key` is
/// the pipeline's job. Tool failures must be captured into the result rather
/// than returned as errors.
#[async_trait]
pub trait WorkerUnit: Send + Sync {
    /// Static description of this unit
    fn spec(&self) -> &UnitSpec;

    /// Get the unit's name
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Execute the unit once
    async fn run(&self, query: &str, inputs: &UnitInputs, ctx: &UnitContext) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = UnitSpec::builder("sumarizador")
            .description("Resume a pesquisa\nSegunda linha")
            .instruction("Resuma {pesquisa}")
            .input("pesquisa")
            .output_key("sumario")
            .build();

        assert_eq!(spec.name, "sumarizador");
        assert_eq!(spec.input_keys, vec!["pesquisa"]);
        assert_eq!(spec.output_key.as_deref(), Some("sumario"));
        assert_eq!(spec.summary(), "Resume a pesquisa");
    }

    #[test]
    fn test_empty_description_summary() {
        let spec = UnitSpec::builder("x").build();
        assert_eq!(spec.summary(), "");
        assert!(spec.output_key.is_none());
    }

    #[test]
    fn test_context_cancellation() {
        let (emitter, _rx) = EventEmitter::channel("r");
        let token = CancellationToken::new();
        let ctx = UnitContext::new(emitter, token.clone()).for_unit("child");

        assert!(ctx.ensure_active().is_ok());
        assert_eq!(ctx.events.author(), "child");
        token.cancel();
        assert!(ctx.ensure_active().unwrap_err().is_cancelled());
    }
}
