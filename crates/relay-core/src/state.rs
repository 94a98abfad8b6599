//! Shared pipeline state and resolved unit inputs
//!
//! `PipelineState` is the append-only key/value store threading results
//! between the stages of one run. Units never see it directly: the pipeline
//! resolves each unit's declared input keys into a [`UnitInputs`] map, where an
//! absent key becomes the explicit [`Input::Missing`] sentinel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Key/value state of a single pipeline run
///
/// Keys are published once and never overwritten within a run.
///
/// # Example
///
/// ```
/// use relay_core::PipelineState;
/// use serde_json::json;
///
/// let mut state = PipelineState::new();
/// state.publish("entidade", json!("fundos imobiliários")).unwrap();
///
/// assert!(state.contains_key("entidade"));
/// assert!(state.publish("entidade", json!("again")).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    data: BTreeMap<String, Value>,
    /// Publication order, so reports can list keys as they appeared
    order: Vec<String>,
}

impl PipelineState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value under a key that has not been written in this run
    pub fn publish(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if self.data.contains_key(&key) {
            return Err(Error::KeyAlreadyPublished(key));
        }
        self.order.push(key.clone());
        self.data.insert(key, value);
        Ok(())
    }

    /// Get a value from the state
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a typed value from the state
    ///
    /// Deserializes the JSON value into the specified type.
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Error::from)
    }

    /// Check if a key has been published
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys in publication order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of published keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing has been published
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolve a set of declared keys into unit inputs
    pub fn resolve<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> UnitInputs {
        let mut inputs = UnitInputs::default();
        for key in keys {
            let input = match self.data.get(key) {
                Some(value) => Input::Present(value.clone()),
                None => Input::Missing,
            };
            inputs.entries.push((key.clone(), input));
        }
        inputs
    }

    /// Snapshot of the state as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.data.clone().into_iter().collect())
    }
}

/// A resolved input value, or the sentinel for an absent upstream key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Input {
    /// The upstream unit published this value
    Present(Value),
    /// No upstream unit published the key
    Missing,
}

impl Input {
    /// Whether this is the missing sentinel
    pub fn is_missing(&self) -> bool {
        matches!(self, Input::Missing)
    }

    /// The value, if present
    pub fn value(&self) -> Option<&Value> {
        match self {
            Input::Present(value) => Some(value),
            Input::Missing => None,
        }
    }

    /// Text rendering used when interpolating into prompts or tool arguments
    ///
    /// Strings are returned verbatim, other JSON values compactly serialized,
    /// and the missing sentinel becomes an empty string.
    pub fn as_text(&self) -> String {
        match self {
            Input::Present(Value::String(s)) => s.clone(),
            Input::Present(other) => other.to_string(),
            Input::Missing => String::new(),
        }
    }
}

/// Inputs handed to a unit: exactly its declared keys, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitInputs {
    entries: Vec<(String, Input)>,
}

impl UnitInputs {
    /// Inputs with no declared keys
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build inputs directly (used when a unit is invoked outside a pipeline)
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Input)>) -> Self {
        Self {
            entries: pairs.into_iter().collect(),
        }
    }

    /// Look up a declared key; undeclared keys are also reported as missing
    pub fn get(&self, key: &str) -> &Input {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map_or(&Input::Missing, |(_, input)| input)
    }

    /// Iterate declared keys and their resolution
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Input)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Declared keys that resolved to the missing sentinel
    pub fn missing_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, input)| input.is_missing())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// True when at least one key is declared and none is present
    pub fn all_missing(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|(_, input)| input.is_missing())
    }

    /// Number of declared keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a unit result counts as "produced nothing"
///
/// Empty results are not published, so downstream units see [`Input::Missing`].
pub fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
