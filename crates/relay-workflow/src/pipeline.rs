//! Sequential pipeline definition and execution

use relay_core::{
    Error, EventEmitter, EventPayload, PipelineState, Result, UnitContext, WorkerUnit,
    is_empty_result,
};
use relay_trace::event_channel;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::run::{PipelineRun, RunOptions, RunStatus, StageFailure};

/// An ordered chain of units threading results through shared state
///
/// Each unit runs only after its predecessor's result has been published.
/// The first failing stage halts the run.
///
/// # Example
///
/// ```no_run
/// use relay_workflow::SequentialPipeline;
/// use std::sync::Arc;
///
/// # async fn example(extract: Arc<dyn relay_core::WorkerUnit>, search: Arc<dyn relay_core::WorkerUnit>) -> relay_core::Result<()> {
/// let pipeline = SequentialPipeline::builder("research")
///     .unit(extract)
///     .unit(search)
///     .build()?;
///
/// let run = pipeline.run("fundos imobiliários de logística").await;
/// println!("{}: {}", run.status, run.output_text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SequentialPipeline {
    name: String,
    description: String,
    units: Vec<Arc<dyn WorkerUnit>>,
    external_inputs: Vec<String>,
    strict: bool,
}

/// Result of executing the stages, before it is folded into a run record
pub(crate) struct Execution {
    pub stages: Vec<String>,
    pub status: RunStatus,
    pub failure: Option<StageFailure>,
}

impl SequentialPipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn units(&self) -> &[Arc<dyn WorkerUnit>] {
        &self.units
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Keys expected from outside the pipeline (set when nested)
    pub fn external_inputs(&self) -> &[String] {
        &self.external_inputs
    }

    /// Output key of the last unit that declares one
    pub fn output_key(&self) -> Option<&str> {
        self.units
            .iter()
            .rev()
            .find_map(|u| u.spec().output_key.as_deref())
    }

    /// Run with default options
    pub async fn run(&self, query: &str) -> PipelineRun {
        self.run_with(query, RunOptions::default()).await
    }

    /// Run with explicit options (cancellation, session, event tap)
    pub async fn run_with(&self, query: &str, options: RunOptions) -> PipelineRun {
        let run_id = Uuid::new_v4().to_string();
        let (emitter, mut collector) = event_channel(run_id.clone());
        let mut run = PipelineRun::new(run_id, &self.name, query, self.output_key().map(str::to_string));

        run.status = RunStatus::Running;
        info!(pipeline = %self.name, run_id = %run.id, stages = self.units.len(), "pipeline run started");

        let tap = options.tap.clone();
        let execution = {
            let stages = self.execute(query, &mut run.state, &emitter, &options);
            tokio::pin!(stages);
            // Events reach the tap while the stage that emitted them is still running
            loop {
                tokio::select! {
                    execution = &mut stages => break execution,
                    Some(event) = collector.next() => {
                        if let Some(tap) = &tap {
                            tap(event);
                        }
                    }
                }
            }
        };
        collector.drain_with(|event| {
            if let Some(tap) = &tap {
                tap(event);
            }
        });

        run.stages = execution.stages;
        run.status = execution.status;
        run.failure = execution.failure;
        run.events = collector.into_events();
        run.finished_at = Some(chrono::Utc::now());

        match &run.failure {
            Some(failure) => warn!(pipeline = %self.name, run_id = %run.id, %failure, "pipeline run failed"),
            None => info!(pipeline = %self.name, run_id = %run.id, status = %run.status, "pipeline run finished"),
        }
        run
    }

    /// Execute the stages against `state`, emitting through `emitter`
    pub(crate) async fn execute(
        &self,
        query: &str,
        state: &mut PipelineState,
        emitter: &EventEmitter,
        options: &RunOptions,
    ) -> Execution {
        let mut execution = Execution {
            stages: Vec::new(),
            status: RunStatus::Running,
            failure: None,
        };

        for unit in &self.units {
            let spec = unit.spec();
            if options.cancel.is_cancelled() {
                info!(pipeline = %self.name, next_stage = %spec.name, "run cancelled before stage");
                execution.status = RunStatus::Cancelled;
                return execution;
            }

            let inputs = state.resolve(&spec.input_keys);
            let missing = inputs.missing_keys();
            if !missing.is_empty() {
                if self.strict {
                    let err = Error::MissingInput {
                        stage: spec.name.clone(),
                        key: missing[0].to_string(),
                    };
                    execution.fail(&spec.name, &err);
                    return execution;
                }
                debug!(stage = %spec.name, missing = ?missing, "stage runs with missing inputs");
            }

            let mut ctx = UnitContext::new(emitter.for_author(&spec.name), options.cancel.child_token());
            if let Some(session_id) = &options.session_id {
                ctx = ctx.with_session(session_id.clone(), options.history.clone());
            }

            info!(pipeline = %self.name, stage = %spec.name, "stage started");
            let result = tokio::select! {
                biased;
                () = options.cancel.cancelled() => Err(Error::Cancelled),
                result = unit.run(query, &inputs, &ctx) => result,
            };

            match result.and_then(|value| publish(state, &ctx, spec.output_key.as_deref(), value)) {
                Ok(()) => execution.stages.push(spec.name.clone()),
                Err(Error::Cancelled) => {
                    info!(pipeline = %self.name, stage = %spec.name, "stage cancelled");
                    execution.status = RunStatus::Cancelled;
                    return execution;
                }
                Err(err) => {
                    execution.fail(&spec.name, &err);
                    return execution;
                }
            }
        }

        execution.status = RunStatus::Completed;
        execution
    }
}

impl Execution {
    fn fail(&mut self, stage: &str, err: &Error) {
        warn!(stage, error = %err, "stage failed");
        self.status = RunStatus::Failed;
        self.failure = Some(StageFailure {
            stage: stage.to_string(),
            error: err.to_string(),
        });
    }
}

/// Emit the stage's final event and publish a non-empty result
fn publish(state: &mut PipelineState, ctx: &UnitContext, output_key: Option<&str>, value: Value) -> Result<()> {
    ctx.events.emit(
        EventPayload::Content {
            text: display_value(&value),
        },
        true,
    );

    let Some(key) = output_key else {
        return Ok(());
    };
    if is_empty_result(&value) {
        debug!(stage = ctx.events.author(), key, "empty result; key not published");
        return Ok(());
    }

    state.publish(key, value.clone())?;
    let mut delta = Map::new();
    delta.insert(key.to_string(), value);
    let mut action = Map::new();
    action.insert("state_delta".to_string(), Value::Object(delta));
    ctx.events.action(Value::Object(action));
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    description: String,
    units: Vec<Arc<dyn WorkerUnit>>,
    external_inputs: Vec<String>,
    strict: bool,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            units: Vec::new(),
            external_inputs: Vec::new(),
            strict: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a stage
    pub fn unit(mut self, unit: Arc<dyn WorkerUnit>) -> Self {
        self.units.push(unit);
        self
    }

    /// Append a stage by value
    pub fn add<U: WorkerUnit + 'static>(self, unit: U) -> Self {
        self.unit(Arc::new(unit))
    }

    /// Treat missing inputs as fatal
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Declare a key supplied from outside (by an enclosing pipeline)
    pub fn external_input(mut self, key: impl Into<String>) -> Self {
        self.external_inputs.push(key.into());
        self
    }

    /// Validate and build the pipeline
    ///
    /// Unit names and output keys must be unique, and every declared input
    /// must be published by an earlier unit or declared external.
    pub fn build(self) -> Result<SequentialPipeline> {
        if self.units.is_empty() {
            return Err(Error::InvalidPipeline(format!(
                "pipeline '{}' has no units",
                self.name
            )));
        }

        let mut names = HashSet::new();
        let mut available: HashSet<&str> = self.external_inputs.iter().map(String::as_str).collect();
        for unit in &self.units {
            let spec = unit.spec();
            if !names.insert(spec.name.as_str()) {
                return Err(Error::InvalidPipeline(format!(
                    "duplicate unit name '{}'",
                    spec.name
                )));
            }
            if let Some(key) = spec.input_keys.iter().find(|k| !available.contains(k.as_str())) {
                return Err(Error::InvalidPipeline(format!(
                    "unit '{}' reads '{key}', which no earlier unit publishes",
                    spec.name
                )));
            }
            if let Some(key) = &spec.output_key {
                if !available.insert(key.as_str()) {
                    return Err(Error::InvalidPipeline(format!(
                        "output key '{key}' of unit '{}' is already published",
                        spec.name
                    )));
                }
            }
        }

        Ok(SequentialPipeline {
            name: self.name,
            description: self.description,
            units: self.units,
            external_inputs: self.external_inputs,
            strict: self.strict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{CancellationToken, EventKind, Input, UnitSpec};
    use relay_runtime::FnUnit;
    use serde_json::json;

    fn fn_unit(
        name: &str,
        inputs: &[&str],
        output: Option<&str>,
        f: impl Fn(&str, &relay_core::UnitInputs) -> Result<Value> + Send + Sync + 'static,
    ) -> Arc<dyn WorkerUnit> {
        let mut spec = UnitSpec::builder(name).description(format!("{name} stage"));
        for key in inputs {
            spec = spec.input(*key);
        }
        if let Some(key) = output {
            spec = spec.output_key(key);
        }
        Arc::new(FnUnit::new(spec.build(), f))
    }

    #[test]
    fn test_build_validation() {
        let a = fn_unit("a", &[], Some("k"), |_, _| Ok(json!(1)));
        let dup_name = SequentialPipeline::builder("p").unit(a.clone()).unit(a.clone()).build();
        assert!(matches!(dup_name, Err(Error::InvalidPipeline(_))));

        let b = fn_unit("b", &[], Some("k"), |_, _| Ok(json!(1)));
        let dup_key = SequentialPipeline::builder("p").unit(a.clone()).unit(b).build();
        assert!(dup_key.is_err());

        let reads_later = fn_unit("c", &["later"], None, |_, _| Ok(json!(1)));
        let unknown = SequentialPipeline::builder("p").unit(reads_later.clone()).build();
        assert!(unknown.is_err());

        let external = SequentialPipeline::builder("p")
            .external_input("later")
            .unit(reads_later)
            .build();
        assert!(external.is_ok());

        assert!(SequentialPipeline::builder("empty").build().is_err());
    }

    #[tokio::test]
    async fn test_happens_before() {
        // Each stage records what it could see when it started
        let pipeline = SequentialPipeline::builder("chain")
            .unit(fn_unit("s1", &[], Some("k1"), |_, _| Ok(json!("v1"))))
            .unit(fn_unit("s2", &["k1"], Some("k2"), |_, inputs| {
                assert!(!inputs.get("k1").is_missing());
                Ok(json!(format!("{}+v2", inputs.get("k1").as_text())))
            }))
            .unit(fn_unit("s3", &["k2"], Some("k3"), |_, inputs| {
                Ok(json!(format!("{}+v3", inputs.get("k2").as_text())))
            }))
            .build()
            .unwrap();

        let run = pipeline.run("q").await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.stages, vec!["s1", "s2", "s3"]);
        assert_eq!(run.output(), Some(&json!("v1+v2+v3")));
        assert_eq!(run.state.keys().collect::<Vec<_>>(), vec!["k1", "k2", "k3"]);

        // No event of stage N+1 precedes the final event of stage N
        let final_positions: Vec<usize> = ["s1", "s2", "s3"]
            .iter()
            .map(|name| {
                run.events
                    .iter()
                    .position(|e| e.author == *name && e.is_final)
                    .unwrap()
            })
            .collect();
        for (i, name) in ["s2", "s3"].iter().enumerate() {
            let first = run.events.iter().position(|e| e.author == *name).unwrap();
            assert!(first > final_positions[i]);
        }

        let sequences: Vec<u64> = run.events.iter().map(|e| e.sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
        assert!(run.events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_failure_halts_run() {
        let pipeline = SequentialPipeline::builder("p")
            .unit(fn_unit("ok", &[], Some("a"), |_, _| Ok(json!("a"))))
            .unit(fn_unit("broken", &["a"], Some("b"), |_, _| {
                Err(Error::ProcessingFailed("malformed".into()))
            }))
            .unit(fn_unit("never", &["b"], Some("c"), |_, _| panic!("must not run")))
            .build()
            .unwrap();

        let run = pipeline.run("q").await;
        assert_eq!(run.status, RunStatus::Failed);
        let failure = run.failure.as_ref().unwrap();
        assert_eq!(failure.stage, "broken");
        assert!(failure.error.contains("malformed"));
        assert_eq!(run.stages, vec!["ok"]);
        assert_eq!(run.events_by("never").count(), 0);
    }

    fn empty_then_consumer() -> PipelineBuilder {
        SequentialPipeline::builder("fii")
            .unit(fn_unit("extrator", &[], Some("tickers_string"), |_, _| Ok(json!(""))))
            .unit(fn_unit("analista", &["tickers_string"], Some("relatorio"), |_, inputs| {
                match inputs.get("tickers_string") {
                    Input::Missing => Ok(json!("Nenhum ticker informado.")),
                    Input::Present(v) => Ok(v.clone()),
                }
            }))
    }

    #[tokio::test]
    async fn test_missing_key_non_strict_completes() {
        let run = empty_then_consumer().build().unwrap().run("q").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert!(!run.state.contains_key("tickers_string"));
        assert_eq!(run.output_text(), "Nenhum ticker informado.");
    }

    #[tokio::test]
    async fn test_missing_key_strict_fails_naming_stage() {
        let run = empty_then_consumer().strict(true).build().unwrap().run("q").await;

        assert_eq!(run.status, RunStatus::Failed);
        let failure = run.failure.as_ref().unwrap();
        assert_eq!(failure.stage, "analista");
        assert!(failure.error.contains("tickers_string"));
        assert_eq!(run.events_by("analista").count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_first_stage() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let pipeline = SequentialPipeline::builder("p")
            .unit(fn_unit("s1", &[], Some("k1"), move |_, _| {
                trigger.cancel();
                Ok(json!("v1"))
            }))
            .unit(fn_unit("s2", &["k1"], Some("k2"), |_, _| panic!("must not start")))
            .build()
            .unwrap();

        let run = pipeline
            .run_with("q", RunOptions::new().with_cancel(token))
            .await;

        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.stages, vec!["s1"]);
        assert!(run.events.iter().all(|e| e.author == "s1"));
        assert!(run.events.iter().any(|e| e.is_final));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_stage() {
        struct Stalled(UnitSpec);

        #[async_trait::async_trait]
        impl WorkerUnit for Stalled {
            fn spec(&self) -> &UnitSpec {
                &self.0
            }

            async fn run(&self, _: &str, _: &relay_core::UnitInputs, ctx: &UnitContext) -> Result<Value> {
                ctx.events.function_call("slow_tool", json!({}));
                std::future::pending::<()>().await;
                Ok(Value::Null)
            }
        }

        let token = CancellationToken::new();
        let pipeline = SequentialPipeline::builder("p")
            .add(Stalled(UnitSpec::builder("stalled").build()))
            .build()
            .unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let run = pipeline.run_with("q", RunOptions::new().with_cancel(token)).await;
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.stages.is_empty());
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].kind(), EventKind::FunctionCall);
    }

    #[tokio::test]
    async fn test_tap_sees_every_event() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = SequentialPipeline::builder("p")
            .unit(fn_unit("s1", &[], Some("k1"), |_, _| Ok(json!("v"))))
            .build()
            .unwrap();

        let run = pipeline
            .run_with(
                "q",
                RunOptions::new().with_tap(move |e| sink.lock().unwrap().push(e.id.clone())),
            )
            .await;

        let ids: Vec<String> = run.events.iter().map(|e| e.id.clone()).collect();
        assert_eq!(*seen.lock().unwrap(), ids);
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.events[1].kind(), EventKind::Action);
    }

    #[tokio::test]
    async fn test_tap_runs_while_stage_in_flight() {
        /// Emits a call, then waits until someone has seen it
        struct AwaitsTap(UnitSpec, Arc<tokio::sync::Notify>);

        #[async_trait::async_trait]
        impl WorkerUnit for AwaitsTap {
            fn spec(&self) -> &UnitSpec {
                &self.0
            }

            async fn run(&self, _: &str, _: &relay_core::UnitInputs, ctx: &UnitContext) -> Result<Value> {
                ctx.events.function_call("get_fii_data", json!({"tickers_string": "HGLG11"}));
                self.1.notified().await;
                Ok(json!("pronto"))
            }
        }

        let seen = Arc::new(tokio::sync::Notify::new());
        let pipeline = SequentialPipeline::builder("p")
            .add(AwaitsTap(UnitSpec::builder("analista").build(), Arc::clone(&seen)))
            .build()
            .unwrap();

        let options = RunOptions::new().with_tap(move |e| {
            if e.kind() == EventKind::FunctionCall {
                seen.notify_one();
            }
        });
        let run = tokio::time::timeout(std::time::Duration::from_secs(2), pipeline.run_with("q", options))
            .await
            .expect("tap never saw the in-flight call");

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.events[0].kind(), EventKind::FunctionCall);
    }
}
