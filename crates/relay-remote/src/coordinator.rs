//! Delegating coordinator: a unit that forwards subtasks to remote workers

use async_trait::async_trait;
use futures::future::join_all;
use relay_core::{
    CancellationToken, Error, EventEmitter, Input, Result, UnitContext, UnitInputs, UnitSpec,
    WorkerUnit,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::RemoteClient;
use crate::protocol::TaskRequest;
use crate::selection::{RemoteEndpoint, select_endpoint};

/// How a subtask is scheduled relative to its neighbours
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Runs concurrently with adjacent parallel subtasks
    Parallel,
    /// Runs alone and sees every earlier successful result
    #[default]
    Sequential,
}

/// One piece of delegated work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    /// Skill id to match exactly against endpoint cards
    pub skill: Option<String>,
    pub intent: String,
    #[serde(default)]
    pub mode: DispatchMode,
}

impl Subtask {
    pub fn new(id: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skill: None,
            intent: intent.into(),
            mode: DispatchMode::Sequential,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    pub fn parallel(mut self) -> Self {
        self.mode = DispatchMode::Parallel;
        self
    }
}

/// Decomposes a query into subtasks
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, query: &str, endpoints: &[RemoteEndpoint]) -> Result<Vec<Subtask>>;
}

/// A fixed plan, independent of the query
#[derive(Debug, Clone)]
pub struct StaticPlan {
    subtasks: Vec<Subtask>,
}

impl StaticPlan {
    pub fn new(subtasks: Vec<Subtask>) -> Self {
        Self { subtasks }
    }

    /// Research the product, then write the copy from the research
    pub fn copywriting() -> Self {
        Self::new(vec![
            Subtask::new(
                "research",
                "Pesquisar o produto, o nicho, o público-alvo e os concorrentes",
            )
            .with_skill("WEB_RESEARCH"),
            Subtask::new(
                "copy",
                "Criar copy persuasivo a partir dos insights de pesquisa",
            )
            .with_skill("COPYWRITING"),
        ])
    }
}

#[async_trait]
impl Planner for StaticPlan {
    async fn plan(&self, _query: &str, _endpoints: &[RemoteEndpoint]) -> Result<Vec<Subtask>> {
        Ok(self.subtasks.clone())
    }
}

/// What happened to one subtask
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome {
    Completed { endpoint: String, result: Value },
    Failed { endpoint: Option<String>, reason: String },
    Cancelled,
}

/// A subtask and its outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub subtask: Subtask,
    pub outcome: SectionOutcome,
}

impl Section {
    fn result_text(&self) -> Option<String> {
        match &self.outcome {
            SectionOutcome::Completed { result, .. } => Some(match result {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            }),
            _ => None,
        }
    }
}

/// Aggregated result of a coordinator run, one section per subtask in plan order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorOutcome {
    pub query: String,
    pub sections: Vec<Section>,
}

impl CoordinatorOutcome {
    /// Whether any subtask failed
    pub fn is_partial_failure(&self) -> bool {
        self.sections
            .iter()
            .any(|s| matches!(s.outcome, SectionOutcome::Failed { .. }))
    }

    pub fn is_cancelled(&self) -> bool {
        self.sections
            .iter()
            .any(|s| matches!(s.outcome, SectionOutcome::Cancelled))
    }

    pub fn completed(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| matches!(s.outcome, SectionOutcome::Completed { .. }))
            .count()
    }

    /// Text rendering with an explicit note on every failed section
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let id = &section.subtask.id;
            match &section.outcome {
                SectionOutcome::Completed { endpoint, .. } => {
                    let _ = writeln!(out, "## {id} ({endpoint})\n");
                    let _ = writeln!(out, "{}\n", section.result_text().unwrap_or_default());
                }
                SectionOutcome::Failed { endpoint, reason } => {
                    let _ = writeln!(out, "## {id}\n");
                    match endpoint {
                        Some(endpoint) => {
                            let _ = writeln!(out, "> PARTIAL FAILURE: {endpoint}: {reason}\n");
                        }
                        None => {
                            let _ = writeln!(out, "> PARTIAL FAILURE: {reason}\n");
                        }
                    }
                }
                SectionOutcome::Cancelled => {
                    let _ = writeln!(out, "## {id}\n\n> CANCELLED\n");
                }
            }
        }
        out.trim_end().to_string()
    }
}

/// Forwards a plan's subtasks to remote worker services
///
/// Endpoints are fixed at construction. Transport failures become failed
/// sections rather than errors, so a run always produces an outcome.
pub struct DelegatingCoordinator {
    spec: UnitSpec,
    endpoints: Vec<RemoteEndpoint>,
    planner: Arc<dyn Planner>,
    client: RemoteClient,
}

impl DelegatingCoordinator {
    pub fn builder(name: impl Into<String>) -> DelegatingCoordinatorBuilder {
        DelegatingCoordinatorBuilder::new(name)
    }

    pub fn endpoints(&self) -> &[RemoteEndpoint] {
        &self.endpoints
    }

    /// Run the plan for `query` without events or external cancellation
    pub async fn run(&self, query: &str) -> Result<CoordinatorOutcome> {
        self.run_with(query, None, &CancellationToken::new(), None).await
    }

    /// Run the plan, recording each delegation on `events` when given
    #[instrument(skip(self, cancel, events), fields(coordinator = %self.spec.name))]
    pub async fn run_with(
        &self,
        query: &str,
        session_id: Option<&str>,
        cancel: &CancellationToken,
        events: Option<&EventEmitter>,
    ) -> Result<CoordinatorOutcome> {
        let plan = self.planner.plan(query, &self.endpoints).await?;
        info!(subtasks = plan.len(), endpoints = self.endpoints.len(), "delegating plan");

        let mut sections: Vec<Section> = Vec::with_capacity(plan.len());
        let mut start = 0;
        while start < plan.len() {
            let end = batch_end(&plan, start);
            let batch = &plan[start..end];

            if cancel.is_cancelled() {
                sections.extend(batch.iter().map(|subtask| Section {
                    subtask: subtask.clone(),
                    outcome: SectionOutcome::Cancelled,
                }));
                start = end;
                continue;
            }

            let context = working_context(query, &sections);
            let outcomes = join_all(batch.iter().map(|subtask| {
                let message = match subtask.mode {
                    DispatchMode::Parallel => format!("{}\n\nRequest: {query}", subtask.intent),
                    DispatchMode::Sequential => format!("{}\n\n{context}", subtask.intent),
                };
                self.delegate(subtask, message, session_id, cancel, events)
            }))
            .await;

            sections.extend(batch.iter().cloned().zip(outcomes).map(|(subtask, outcome)| Section {
                subtask,
                outcome,
            }));
            start = end;
        }

        let outcome = CoordinatorOutcome {
            query: query.to_string(),
            sections,
        };
        if outcome.is_partial_failure() {
            warn!(completed = outcome.completed(), total = outcome.sections.len(), "partial failure");
        }
        Ok(outcome)
    }

    async fn delegate(
        &self,
        subtask: &Subtask,
        message: String,
        session_id: Option<&str>,
        cancel: &CancellationToken,
        events: Option<&EventEmitter>,
    ) -> SectionOutcome {
        let Some((index, reason)) = select_endpoint(&self.endpoints, subtask.skill.as_deref(), &subtask.intent) else {
            warn!(subtask = %subtask.id, "no remote worker matches");
            return SectionOutcome::Failed {
                endpoint: None,
                reason: format!("no remote worker matches subtask '{}'", subtask.id),
            };
        };
        let endpoint = &self.endpoints[index];
        let name = endpoint.name().to_string();
        debug!(subtask = %subtask.id, endpoint = %name, ?reason, "endpoint selected");

        let mut request = TaskRequest::new(message);
        if let Some(session_id) = session_id {
            request = request.with_session(session_id);
        }
        if let Some(events) = events {
            events.function_call(&name, json!({ "subtask": subtask.id, "message": request.message }));
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return SectionOutcome::Cancelled,
            result = self.client.send_task(&endpoint.url, &request) => result,
        };

        match result {
            Ok(response) => {
                if let Some(events) = events {
                    events.function_response(&name, json!({ "result": response.result }));
                }
                SectionOutcome::Completed {
                    endpoint: name,
                    result: response.result,
                }
            }
            Err(err) => {
                warn!(subtask = %subtask.id, endpoint = %name, error = %err, "delegation failed");
                if let Some(events) = events {
                    events.function_response(&name, json!({ "error": err.to_string(), "subtask": subtask.id }));
                }
                SectionOutcome::Failed {
                    endpoint: Some(name),
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Exclusive end of the batch starting at `start`
fn batch_end(plan: &[Subtask], start: usize) -> usize {
    if plan[start].mode == DispatchMode::Sequential {
        return start + 1;
    }
    plan[start..]
        .iter()
        .position(|s| s.mode != DispatchMode::Parallel)
        .map_or(plan.len(), |offset| start + offset)
}

/// The query plus every successful result so far
fn working_context(query: &str, sections: &[Section]) -> String {
    let mut context = format!("Request: {query}");
    let prior: Vec<_> = sections
        .iter()
        .filter_map(|s| s.result_text().map(|text| (&s.subtask.id, text)))
        .collect();
    if !prior.is_empty() {
        context.push_str("\n\nPrior results:");
        for (id, text) in prior {
            let _ = write!(context, "\n\n[{id}]\n{text}");
        }
    }
    context
}

#[async_trait]
impl WorkerUnit for DelegatingCoordinator {
    fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    async fn run(&self, query: &str, inputs: &UnitInputs, ctx: &UnitContext) -> Result<Value> {
        let mut request = query.to_string();
        for (key, input) in inputs.iter() {
            if let Input::Present(_) = input {
                let _ = write!(request, "\n\n{key}:\n{}", input.as_text());
            }
        }

        let outcome = self
            .run_with(&request, ctx.session_id.as_deref(), &ctx.cancel, Some(&ctx.events))
            .await?;
        if outcome.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(Value::String(outcome.render()))
    }
}

enum PendingEndpoint {
    Resolved(RemoteEndpoint),
    Discover(String),
}

/// Builder for [`DelegatingCoordinator`]
pub struct DelegatingCoordinatorBuilder {
    spec: relay_core::UnitSpecBuilder,
    endpoints: Vec<PendingEndpoint>,
    planner: Option<Arc<dyn Planner>>,
    client: Option<RemoteClient>,
}

impl DelegatingCoordinatorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: UnitSpec::builder(name),
            endpoints: Vec::new(),
            planner: None,
            client: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec = self.spec.description(description);
        self
    }

    pub fn input(mut self, key: impl Into<String>) -> Self {
        self.spec = self.spec.input(key);
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.spec = self.spec.output_key(key);
        self
    }

    /// Add an endpoint with a known card
    pub fn endpoint(mut self, endpoint: RemoteEndpoint) -> Self {
        self.endpoints.push(PendingEndpoint::Resolved(endpoint));
        self
    }

    /// Add an endpoint whose card is fetched at build time
    pub fn discover(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(PendingEndpoint::Discover(url.into()));
        self
    }

    pub fn planner(mut self, planner: impl Planner + 'static) -> Self {
        self.planner = Some(Arc::new(planner));
        self
    }

    pub fn client(mut self, client: RemoteClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Resolve endpoints and build the coordinator
    ///
    /// An endpoint whose card cannot be fetched is kept as unresolved and is
    /// never selected.
    pub async fn build(self) -> Result<DelegatingCoordinator> {
        let client = match self.client {
            Some(client) => client,
            None => RemoteClient::with_defaults()?,
        };

        let mut endpoints = Vec::with_capacity(self.endpoints.len());
        for pending in self.endpoints {
            let endpoint = match pending {
                PendingEndpoint::Resolved(endpoint) => endpoint,
                PendingEndpoint::Discover(url) => match client.fetch_card(&url).await {
                    Ok(card) => {
                        info!(%url, agent = %card.name, skills = card.skills.len(), "discovered remote worker");
                        RemoteEndpoint::new(url, card)
                    }
                    Err(err) => {
                        warn!(%url, error = %err, "remote worker unreachable; kept unresolved");
                        RemoteEndpoint::unresolved(url)
                    }
                },
            };
            endpoints.push(endpoint);
        }

        Ok(DelegatingCoordinator {
            spec: self.spec.build(),
            endpoints,
            planner: self
                .planner
                .unwrap_or_else(|| Arc::new(StaticPlan::copywriting())),
            client,
        })
    }
}
