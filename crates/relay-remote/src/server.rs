//! Remote Worker Service: a worker unit exposed over HTTP
//!
//! Routes:
//! - `POST {endpoint_path}` runs the unit on `{message, session_id}`
//! - `GET /.well-known/agent.json` returns the capability descriptor
//! - `GET /health`

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::{CancellationToken, EventPayload, Turn, WorkerUnit};
use relay_utils::Settings;
use relay_workflow::{PipelineRun, RunOptions, RunStatus, SequentialPipeline};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::card::{AgentCard, CARD_PATH};
use crate::error::Result;
use crate::protocol::{TaskRequest, TaskResponse};

/// Session retention limits
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// A session idle for longer than this is discarded
    pub idle_ttl: Duration,
    /// Turns kept per session; older turns are dropped first
    pub max_turns: usize,
    /// Sessions kept; the least recently active one is evicted
    pub max_sessions: usize,
    /// Period of the background sweeper
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_turns: 20,
            max_sessions: 1024,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }
}

struct Session {
    turns: VecDeque<Turn>,
    last_active: Instant,
}

/// Conversation history per session id
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Prior turns of a session, oldest first (empty for unknown or expired sessions)
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(session_id) {
            Some(session) if session.last_active.elapsed() > self.config.idle_ttl => {
                debug!(session_id, "session expired");
                sessions.remove(session_id);
                Vec::new()
            }
            Some(session) => session.turns.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Append a turn, creating the session if needed
    pub fn record(&self, session_id: &str, turn: Turn) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if !sessions.contains_key(session_id) && sessions.len() >= self.config.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_active)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(evicted = %oldest, "session store full");
                sessions.remove(&oldest);
            }
        }

        let session = sessions.entry(session_id.to_string()).or_insert_with(|| Session {
            turns: VecDeque::new(),
            last_active: Instant::now(),
        });
        session.turns.push_back(turn);
        while session.turns.len() > self.config.max_turns {
            session.turns.pop_front();
        }
        session.last_active = Instant::now();
    }

    /// Drop expired sessions; returns how many were removed
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() <= self.config.idle_ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep periodically until `shutdown` is cancelled
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.config.sweep_interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            debug!(removed, "swept idle sessions");
                        }
                    }
                }
            }
        })
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path tasks are posted to, e.g. `/research_agent`
    pub endpoint_path: String,
    /// Maximum request body size in bytes
    pub body_limit: usize,
    pub session: SessionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/".to_string(),
            body_limit: 1024 * 1024,
            session: SessionConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new(endpoint_path: impl Into<String>) -> Self {
        let path = endpoint_path.into();
        let endpoint_path = if path.starts_with('/') { path } else { format!("/{path}") };
        Self {
            endpoint_path,
            ..Self::default()
        }
    }

    /// Session TTL taken from the environment settings
    pub fn from_settings(endpoint_path: impl Into<String>, settings: &Settings) -> Self {
        Self::new(endpoint_path).with_session(SessionConfig::default().with_idle_ttl(settings.session_ttl))
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }
}

struct ServiceState {
    card: AgentCard,
    pipeline: SequentialPipeline,
    sessions: SessionStore,
}

/// A worker unit served over HTTP
///
/// Every request runs the unit in its own single-stage pipeline run, so
/// concurrent requests share nothing but the session store.
#[derive(Clone)]
pub struct RemoteWorkerService {
    state: Arc<ServiceState>,
    config: ServiceConfig,
}

impl RemoteWorkerService {
    pub fn new(card: AgentCard, unit: Arc<dyn WorkerUnit>, config: ServiceConfig) -> relay_core::Result<Self> {
        // Served units start from empty state; declared inputs resolve as missing
        let mut builder = SequentialPipeline::builder(unit.name()).description(card.description.clone());
        for key in &unit.spec().input_keys {
            builder = builder.external_input(key.clone());
        }
        let pipeline = builder.unit(unit).build()?;

        Ok(Self {
            state: Arc::new(ServiceState {
                card,
                pipeline,
                sessions: SessionStore::new(config.session.clone()),
            }),
            config,
        })
    }

    pub fn card(&self) -> &AgentCard {
        &self.state.card
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.state.sessions
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.config.endpoint_path, post(handle_task))
            .route(CARD_PATH, get(handle_card))
            .route("/health", get(health_check))
            .layer(RequestBodyLimitLayer::new(self.config.body_limit))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Serve on `listener` until `shutdown` is cancelled
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let sweeper = self.state.sessions.spawn_sweeper(shutdown.clone());
        info!(
            agent = %self.state.card.name,
            address = %listener.local_addr()?,
            path = %self.config.endpoint_path,
            "remote worker listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        sweeper.abort();
        info!(agent = %self.state.card.name, "remote worker stopped");
        Ok(())
    }

    /// Bind `address` and serve until `shutdown` is cancelled
    pub async fn bind(self, address: &str, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(address).await?;
        self.serve(listener, shutdown).await
    }
}

async fn handle_task(
    State(state): State<Arc<ServiceState>>,
    payload: std::result::Result<Json<TaskRequest>, JsonRejection>,
) -> (StatusCode, Json<TaskResponse>) {
    let agent = state.card.name.clone();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(%agent, error = %rejection, "malformed task request");
            return (
                StatusCode::BAD_REQUEST,
                Json(TaskResponse::failed(agent, String::new(), rejection.body_text())),
            );
        }
    };

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let history = state.sessions.history(&session_id);
    debug!(%agent, %session_id, turns = history.len(), "task received");

    let options = RunOptions::new().with_session(session_id.clone(), history);
    let run = state.pipeline.run_with(&request.message, options).await;

    if run.status != RunStatus::Completed {
        let error = run
            .failure
            .as_ref()
            .map_or_else(|| format!("run ended as {}", run.status), ToString::to_string);
        warn!(%agent, %session_id, %error, "task failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TaskResponse::failed(agent, session_id, error)),
        );
    }

    let result = unit_result(&run);
    state
        .sessions
        .record(&session_id, Turn::new(request.message, result.clone()));
    info!(%agent, %session_id, "task completed");
    (StatusCode::OK, Json(TaskResponse::completed(agent, session_id, result)))
}

/// The published output, or the unit's final content when it publishes nothing
fn unit_result(run: &PipelineRun) -> Value {
    if let Some(value) = run.output() {
        return value.clone();
    }
    run.events
        .iter()
        .rev()
        .find(|e| e.is_final)
        .and_then(|e| match &e.payload {
            EventPayload::Content { text } if !text.is_empty() => Some(Value::String(text.clone())),
            _ => None,
        })
        .unwrap_or(Value::Null)
}

async fn handle_card(State(state): State<Arc<ServiceState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

async fn health_check(State(state): State<Arc<ServiceState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "agent": state.card.name,
        "sessions": state.sessions.len(),
    }))
}
