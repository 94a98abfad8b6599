//! Execution trace collection and reporting for relay
//!
//! Producers append [`ExecutionEvent`](relay_core::ExecutionEvent)s through an
//! emitter; the [`EventTraceCollector`] drains them in arrival order and the
//! resulting [`Trace`] renders to Markdown or JSON.

pub mod collector;
pub mod report;

pub use collector::{EventTraceCollector, event_channel};
pub use report::{Trace, render_json, render_markdown};
