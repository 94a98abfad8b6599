//! Instruction rendering
//!
//! Unit instructions are MiniJinja templates that may only reference `query`
//! and the unit's declared inputs. The context holds `query` and every
//! declared input that is present; missing inputs are left undefined so
//! a template can branch on them:
//!
//! ```text
//! Summarise {{ pesquisa }}.
//! {% if pesquisa is not defined %}No research was produced; say so.{% endif %}
//! ```

use minijinja::Environment;
use relay_core::{Error, Input, Result, UnitInputs, UnitSpec};
use serde_json::{Map, Value};

/// Check that an instruction parses and only references `query` or declared inputs
pub fn validate_instruction(spec: &UnitSpec) -> Result<()> {
    let env = Environment::new();
    let template = env.template_from_str(&spec.instruction).map_err(|e| {
        Error::InitializationFailed(format!("instruction of unit '{}': {e}", spec.name))
    })?;

    let mut undeclared: Vec<String> = template
        .undeclared_variables(false)
        .into_iter()
        .filter(|name| name != "query" && !spec.input_keys.contains(name))
        .collect();
    if !undeclared.is_empty() {
        undeclared.sort();
        return Err(Error::InitializationFailed(format!(
            "instruction of unit '{}' references undeclared inputs: {}",
            spec.name,
            undeclared.join(", ")
        )));
    }
    Ok(())
}

/// Render a unit's instruction against the query and its resolved inputs
pub fn render_instruction(spec: &UnitSpec, query: &str, inputs: &UnitInputs) -> Result<String> {
    let mut context = Map::new();
    context.insert("query".to_string(), Value::String(query.to_string()));
    for (key, input) in inputs.iter() {
        if let Input::Present(value) = input {
            context.insert(key.to_string(), value.clone());
        }
    }

    Environment::new()
        .render_str(&spec.instruction, Value::Object(context))
        .map_err(|e| {
            Error::ProcessingFailed(format!("rendering instruction of unit '{}': {e}", spec.name))
        })
}

/// The user turn: the query followed by the declared inputs
pub fn user_message(query: &str, inputs: &UnitInputs) -> String {
    if inputs.is_empty() {
        return query.to_string();
    }

    let mut message = format!("{query}\n\nInputs:");
    for (key, input) in inputs.iter() {
        match input {
            Input::Present(_) => message.push_str(&format!("\n- {key}: {}", input.as_text())),
            Input::Missing => message.push_str(&format!("\n- {key}: (not available)")),
        }
    }
    message
}
