//! Execution events and the producer side of the event channel
//!
//! Every observable piece of work in a run (a unit's content, a tool call, a
//! tool response, a state change) is appended as one [`ExecutionEvent`].
//! Producers hold an [`EventEmitter`]; the single consumer drains the paired
//! receiver in FIFO order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

/// Discriminant of an event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Content,
    FunctionCall,
    FunctionResponse,
    Action,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Content => "content",
            EventKind::FunctionCall => "function_call",
            EventKind::FunctionResponse => "function_response",
            EventKind::Action => "action",
        };
        f.write_str(label)
    }
}

/// What an event carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Text produced by a unit
    Content { text: String },
    /// A tool (or remote worker) invocation
    FunctionCall { name: String, args: Value },
    /// The result of an invocation; captured failures carry an `error` field
    FunctionResponse { name: String, response: Value },
    /// A side effect such as a state publication
    Action { action: Value },
}

impl EventPayload {
    /// The kind of this payload
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Content { .. } => EventKind::Content,
            EventPayload::FunctionCall { .. } => EventKind::FunctionCall,
            EventPayload::FunctionResponse { .. } => EventKind::FunctionResponse,
            EventPayload::Action { .. } => EventKind::Action,
        }
    }
}

/// One recorded unit of observable activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Unique within the run
    pub id: String,
    /// Position in the run's total order, starting at 0
    pub sequence: u64,
    /// Wall-clock time, non-decreasing in sequence order
    pub timestamp: DateTime<Utc>,
    /// Name of the unit that produced the event
    pub author: String,
    /// Whether this is the unit's final response
    pub is_final: bool,
    /// Event body
    pub payload: EventPayload,
}

impl ExecutionEvent {
    /// The kind of this event
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[derive(Debug)]
struct Clock {
    next_sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Producer handle for a run's event channel
///
/// Cloning is cheap; all clones share one sequence counter so that sequence
/// numbers, timestamps and channel order agree even when concurrent
/// subtasks emit at the same time.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    run_id: Arc<str>,
    author: Arc<str>,
    clock: Arc<Mutex<Clock>>,
    sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl EventEmitter {
    /// Create an emitter and its receiving end for one run
    pub fn channel(
        run_id: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let emitter = Self {
            run_id: Arc::from(run_id.into()),
            author: Arc::from("pipeline"),
            clock: Arc::new(Mutex::new(Clock {
                next_sequence: 0,
                last_timestamp: None,
            })),
            sender,
        };
        (emitter, receiver)
    }

    /// An emitter that stamps events with a different author
    pub fn for_author(&self, author: impl Into<String>) -> Self {
        Self {
            run_id: Arc::clone(&self.run_id),
            author: Arc::from(author.into()),
            clock: Arc::clone(&self.clock),
            sender: self.sender.clone(),
        }
    }

    /// Run this emitter belongs to
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Author stamped on emitted events
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Append an event; returns the recorded copy
    ///
    /// Emission after the collector is gone is not an error: the event is
    /// simply not observed.
    pub fn emit(&self, payload: EventPayload, is_final: bool) -> ExecutionEvent {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let timestamp = match clock.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        let sequence = clock.next_sequence;
        clock.next_sequence += 1;
        clock.last_timestamp = Some(timestamp);

        let event = ExecutionEvent {
            id: format!("{}-{:04}", self.run_id, sequence),
            sequence,
            timestamp,
            author: self.author.to_string(),
            is_final,
            payload,
        };

        // Send while holding the clock so channel order matches sequence order
        if self.sender.send(event.clone()).is_err() {
            trace!(event_id = %event.id, "event receiver dropped");
        }
        event
    }

    /// Emit non-final text content
    pub fn content(&self, text: impl Into<String>) -> ExecutionEvent {
        self.emit(EventPayload::Content { text: text.into() }, false)
    }

    /// Emit the unit's final response
    pub fn final_content(&self, text: impl Into<String>) -> ExecutionEvent {
        self.emit(EventPayload::Content { text: text.into() }, true)
    }

    /// Emit a function call
    pub fn function_call(&self, name: impl Into<String>, args: Value) -> ExecutionEvent {
        self.emit(
            EventPayload::FunctionCall {
                name: name.into(),
                args,
            },
            false,
        )
    }

    /// Emit a function response
    pub fn function_response(&self, name: impl Into<String>, response: Value) -> ExecutionEvent {
        self.emit(
            EventPayload::FunctionResponse {
                name: name.into(),
                response,
            },
            false,
        )
    }

    /// Emit an action
    pub fn action(&self, action: Value) -> ExecutionEvent {
        self.emit(EventPayload::Action { action }, false)
    }
}
