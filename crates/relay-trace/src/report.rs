//! Trace documents and their Markdown/JSON renderings

use relay_core::{EventPayload, ExecutionEvent, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;

/// Everything observed during one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub query: String,
    pub events: Vec<ExecutionEvent>,
}

impl Trace {
    pub fn new(query: impl Into<String>, events: Vec<ExecutionEvent>) -> Self {
        Self {
            query: query.into(),
            events,
        }
    }

    /// Parse a trace previously produced by [`render_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Pretty-printed JSON document of a trace
pub fn render_json(trace: &Trace) -> Result<String> {
    Ok(serde_json::to_string_pretty(trace)?)
}

/// Markdown report of a trace
///
/// The output depends only on `trace`: rendering twice yields the same text.
pub fn render_markdown(trace: &Trace) -> String {
    let mut out = String::new();
    out.push_str("# Agent Execution Report\n\n");
    out.push_str("## User Query\n\n");
    let fence = fence_for(&trace.query);
    let _ = writeln!(out, "{fence}\n{}\n{fence}\n", trace.query);
    out.push_str("## Execution Events\n\n");

    if trace.events.is_empty() {
        out.push_str("_No events were recorded._\n");
        return out;
    }

    for event in &trace.events {
        render_event(&mut out, event);
        out.push_str("---\n\n");
    }
    out
}

fn render_event(out: &mut String, event: &ExecutionEvent) {
    let _ = writeln!(out, "### Event `{}`\n", event.id);
    let _ = writeln!(out, "- **Timestamp**: {}", event.timestamp.to_rfc3339());
    let _ = writeln!(out, "- **Author**: `{}`", event.author);
    let _ = writeln!(out, "- **Kind**: `{}`", event.kind());
    let _ = writeln!(out, "- **Final response**: `{}`", event.is_final);

    match &event.payload {
        EventPayload::Content { text } => {
            if !text.is_empty() {
                let fence = fence_for(text);
                let _ = writeln!(out, "- **Content**:\n\n{fence}\n{text}\n{fence}");
            }
        }
        EventPayload::FunctionCall { name, args } => {
            let _ = writeln!(out, "- **Function call**: `{name}` with `{}`", compact(args));
        }
        EventPayload::FunctionResponse { name, response } => {
            let body = pretty(response);
            let fence = fence_for(&body);
            let _ = writeln!(out, "- **Function response** from `{name}`:\n\n{fence}json\n{body}\n{fence}");
        }
        EventPayload::Action { action } => {
            let _ = writeln!(out, "- **Actions**: `{}`", compact(action));
        }
    }
    out.push('\n');
}

/// Backtick fence longer than any backtick run inside `text`
fn fence_for(text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn compact(value: &Value) -> String {
    value.to_string()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
