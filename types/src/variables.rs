//! Per-row GraphQL variables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The variables sent with one call of the shared query document.
///
/// Key order is the order in which keys appeared in the input record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSet(Map<String, Value>);

#[derive(Debug, Error)]
pub enum VariableSetError {
    #[error("{0}")]
    Syntax(#[from] serde_json::Error),
    #[error("expected a JSON object of variables, got {0}")]
    NotAnObject(&'static str),
}

impl VariableSet {
    /// Parse one input record.
    ///
    /// The record must be a single JSON object; arrays, scalars and `null`
    /// are rejected so that a malformed line can never be sent as variables.
    pub fn parse(raw: &[u8]) -> Result<Self, VariableSetError> {
        Self::from_value(serde_json::from_slice(raw)?)
    }

    /// Accept an already decoded value if it is an object.
    pub fn from_value(value: Value) -> Result<Self, VariableSetError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(VariableSetError::NotAnObject(json_kind(&other))),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for VariableSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
