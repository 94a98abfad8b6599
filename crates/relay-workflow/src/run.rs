//! Run records and per-run options

use chrono::{DateTime, Utc};
use relay_core::{CancellationToken, ExecutionEvent, PipelineState, Turn};
use relay_trace::Trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether the run has reached a final state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// The error that halted a run, attributed to its stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub error: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' failed: {}", self.stage, self.error)
    }
}

/// One invocation of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub pipeline: String,
    pub query: String,
    /// Stages that ran to completion, in order
    pub stages: Vec<String>,
    pub state: PipelineState,
    pub status: RunStatus,
    pub failure: Option<StageFailure>,
    pub events: Vec<ExecutionEvent>,
    /// Output key of the last stage that declares one
    pub output_key: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub(crate) fn new(id: String, pipeline: &str, query: &str, output_key: Option<String>) -> Self {
        Self {
            id,
            pipeline: pipeline.to_string(),
            query: query.to_string(),
            stages: Vec::new(),
            state: PipelineState::new(),
            status: RunStatus::Pending,
            failure: None,
            events: Vec::new(),
            output_key,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// The value published under the pipeline's final output key, if any
    pub fn output(&self) -> Option<&Value> {
        self.output_key.as_deref().and_then(|key| self.state.get(key))
    }

    /// The final output rendered as text (empty when nothing was published)
    pub fn output_text(&self) -> String {
        match self.output() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            None => String::new(),
        }
    }

    /// The run's events as a renderable trace
    pub fn trace(&self) -> Trace {
        Trace::new(self.query.clone(), self.events.clone())
    }

    /// Events authored by a given stage
    pub fn events_by(&self, author: &str) -> impl Iterator<Item = &ExecutionEvent> {
        self.events.iter().filter(move |e| e.author == author)
    }
}

/// Callback observing each event as it is collected
pub type EventTap = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Per-run options
#[derive(Clone, Default)]
pub struct RunOptions {
    pub cancel: CancellationToken,
    pub session_id: Option<String>,
    pub history: Vec<Turn>,
    pub tap: Option<EventTap>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>, history: Vec<Turn>) -> Self {
        self.session_id = Some(session_id.into());
        self.history = history;
        self
    }

    pub fn with_tap(mut self, tap: impl Fn(&ExecutionEvent) + Send + Sync + 'static) -> Self {
        self.tap = Some(Arc::new(tap));
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("session_id", &self.session_id)
            .field("history", &self.history.len())
            .field("tap", &self.tap.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_display_and_terminal() {
        assert_eq!(RunStatus::Cancelled.to_string(), "cancelled");
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_output_lookup() {
        let mut run = PipelineRun::new("r".into(), "p", "q", Some("sumario".into()));
        assert!(run.output().is_none());
        assert_eq!(run.output_text(), "");

        run.state.publish("sumario", json!("curto")).unwrap();
        assert_eq!(run.output_text(), "curto");
    }

    #[test]
    fn test_failure_display() {
        let failure = StageFailure {
            stage: "analista".into(),
            error: "boom".into(),
        };
        assert_eq!(failure.to_string(), "stage 'analista' failed: boom");
    }
}
