//! Terminal rendering of runs, events and FII data

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use relay_core::{EventPayload, ExecutionEvent};
use relay_workflow::PipelineRun;
use serde_json::Value;
use std::path::Path;

const PREVIEW_CHARS: usize = 100;

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}

/// One line per event, printed while the run is in progress
pub fn print_event(event: &ExecutionEvent) {
    let marker = if event.is_final { "*" } else { " " };
    let body = match &event.payload {
        EventPayload::Content { text } => preview(text),
        EventPayload::FunctionCall { name, args } => format!("→ {name}({})", preview(&args.to_string())),
        EventPayload::FunctionResponse { name, response } => {
            format!("← {name}: {}", preview(&response.to_string()))
        }
        EventPayload::Action { action } => preview(&action.to_string()),
    };
    println!("{:>4}{marker} [{}] {}: {body}", event.sequence, event.author, event.kind());
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Per-stage summary of a finished run
pub fn run_table(run: &PipelineRun) -> Table {
    let mut table = table();
    table.set_header(vec!["Stage", "Events", "Published"]);
    for stage in &run.stages {
        let published: Vec<String> = run
            .events_by(stage)
            .filter_map(|e| match &e.payload {
                EventPayload::Action { action } => action
                    .get("state_delta")
                    .and_then(Value::as_object)
                    .map(|delta| delta.keys().cloned().collect::<Vec<_>>().join(", ")),
                _ => None,
            })
            .collect();
        table.add_row(vec![
            stage.clone(),
            run.events_by(stage).count().to_string(),
            published.join(", "),
        ]);
    }
    table
}

fn number(value: &Value, digits: usize) -> String {
    value
        .as_f64()
        .map_or_else(|| "-".to_string(), |n| format!("{n:.digits$}"))
}

/// Tabular view of a `get_fii_data` result
pub fn fii_table(data: &Value) -> Table {
    let mut table = table();
    table.set_header(vec!["Ticker", "Fund", "Price", "High", "Low", "DY", "Error"]);
    let Some(entries) = data.as_object() else {
        return table;
    };
    for (ticker, entry) in entries {
        let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let field = |key: &str| entry.get(key).unwrap_or(&Value::Null);
        let dividend_yield = field("dividend_yield")
            .as_f64()
            .map_or_else(String::new, |dy| format!("{:.2}%", dy * 100.0));
        table.add_row(vec![
            ticker.clone(),
            text("fund_name"),
            number(field("current_price"), 2),
            number(field("daily_high"), 2),
            number(field("daily_low"), 2),
            dividend_yield,
            text("error"),
        ]);
    }
    table
}

/// Write the run's Markdown execution report
pub fn write_report(path: &Path, run: &PipelineRun) -> Result<()> {
    let mut report = format!(
        "# {}\n\n- Run: `{}`\n- Status: {}\n- Stages: {}\n",
        run.pipeline,
        run.id,
        run.status,
        run.stages.join(" → ")
    );
    if let Some(failure) = &run.failure {
        report.push_str(&format!("- Failure: {failure}\n"));
    }
    report.push('\n');
    report.push_str(&relay_trace::render_markdown(&run.trace()));

    std::fs::write(path, report).with_context(|| format!("writing report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preview_truncates() {
        let long = "palavra ".repeat(40);
        let short = preview(&long);
        assert!(short.ends_with('…'));
        assert_eq!(short.chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(preview("  a \n b "), "a b");
    }

    #[test]
    fn test_fii_table_rows() {
        let data = json!({
            "HGLG11": {"fund_name": "CGHG Logística", "current_price": 160.5, "daily_high": 161.0,
                       "daily_low": 159.0, "dividend_yield": 0.087, "currency": "BRL", "ticker": "HGLG11"},
            "INVALID1": {"error": "Failed to retrieve FII information: no data", "ticker": "INVALID1"}
        });
        let rendered = fii_table(&data).to_string();
        assert!(rendered.contains("160.50"));
        assert!(rendered.contains("8.70%"));
        assert!(rendered.contains("INVALID1"));
    }
}
