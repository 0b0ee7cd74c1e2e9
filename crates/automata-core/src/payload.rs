use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AutomataError, Result};

/// Key holding the recipient address in trigger event data.
pub const RECIPIENT_KEY: &str = "to";

/// Data carried from node to node during a run.
///
/// The engine treats the payload as opaque cargo: it is forwarded unchanged
/// to every successor, and only the `to` field is ever read (for recipient
/// templating). Keys are strings; values are JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    data: Map<String, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a payload from an existing JSON object.
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Create a payload from any JSON value; only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(data) => Ok(Self { data }),
            Value::Null => Ok(Self::new()),
            other => Err(AutomataError::InvalidPayload(format!(
                "payload must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Set a string value.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), Value::String(value.into()));
    }

    /// The recipient address carried by the triggering event, if any.
    pub fn recipient(&self) -> Option<&str> {
        self.get_str(RECIPIENT_KEY)
    }

    /// Get the underlying data map.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(data: Map<String, Value>) -> Self {
        Self::from_map(data)
    }
}
