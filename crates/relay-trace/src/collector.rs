//! Consumer side of a run's event channel

use relay_core::{EventEmitter, ExecutionEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::trace;

use crate::Trace;

/// Create the event channel for one run
///
/// The emitter goes to the producers (pipeline and units); the collector is
/// the single consumer.
pub fn event_channel(run_id: impl Into<String>) -> (EventEmitter, EventTraceCollector) {
    let (emitter, receiver) = EventEmitter::channel(run_id);
    (
        emitter,
        EventTraceCollector {
            receiver,
            events: Vec::new(),
        },
    )
}

/// Accumulates a run's events in arrival order
#[derive(Debug)]
pub struct EventTraceCollector {
    receiver: UnboundedReceiver<ExecutionEvent>,
    events: Vec<ExecutionEvent>,
}

impl EventTraceCollector {
    /// Append every pending event; returns how many were added
    pub fn drain(&mut self) -> usize {
        self.drain_with(|_| {})
    }

    /// Like [`drain`](Self::drain), calling `tap` on each new event first
    pub fn drain_with(&mut self, mut tap: impl FnMut(&ExecutionEvent)) -> usize {
        let mut added = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    trace!(event_id = %event.id, kind = %event.kind(), "collected event");
                    tap(&event);
                    self.events.push(event);
                    added += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        added
    }

    /// Wait for the next event, returning `None` once every emitter is gone
    pub async fn next(&mut self) -> Option<&ExecutionEvent> {
        let event = self.receiver.recv().await?;
        self.events.push(event);
        self.events.last()
    }

    /// Events collected so far
    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    /// Drain what is pending and give up the collected events
    pub fn into_events(mut self) -> Vec<ExecutionEvent> {
        self.drain();
        self.events
    }

    /// Drain what is pending and build a trace for `query`
    pub fn into_trace(self, query: impl Into<String>) -> Trace {
        Trace {
            query: query.into(),
            events: self.into_events(),
        }
    }
}
