use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use automata_core::types::{NodeKind, NodeStatus};

/// Config field holding a decision node's question.
pub const PROMPT: &str = "prompt";
/// Config field holding a transfer node's token amount.
pub const AMOUNT: &str = "amount";
/// Config field holding a transfer/mint recipient template.
pub const RECIPIENT: &str = "recipient";
/// Config field holding the contract a trigger listens on.
pub const CONTRACT_ADDRESS: &str = "contractAddress";
/// Config field holding the event name a trigger listens for.
pub const EVENT_NAME: &str = "eventName";

/// A node in the workflow graph.
///
/// The editor's layout position is not part of the model; unknown fields
/// such as `position` are ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: String,
    /// What the node does when executed.
    #[serde(alias = "type")]
    pub kind: NodeKind,
    /// Kind-specific parameters, edited externally.
    #[serde(default, alias = "data")]
    pub config: Map<String, Value>,
    /// Current execution status.
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    /// Create a new idle node with empty configuration.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            config: Map::new(),
            status: NodeStatus::Idle,
        }
    }

    pub fn trigger(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Trigger)
    }

    pub fn decision(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Decision).with_config(PROMPT, Value::String(prompt.into()))
    }

    pub fn transfer(
        id: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self::new(id, NodeKind::Transfer)
            .with_config(RECIPIENT, Value::String(recipient.into()))
            .with_config(AMOUNT, Value::String(amount.into()))
    }

    pub fn mint(id: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Mint).with_config(RECIPIENT, Value::String(recipient.into()))
    }

    /// Set a config field.
    pub fn with_config(mut self, field: impl Into<String>, value: Value) -> Self {
        self.config.insert(field.into(), value);
        self
    }

    /// A config field as text, if it is a non-empty string.
    pub fn config_str(&self, field: &str) -> Option<&str> {
        self.config
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// A config field rendered as text: strings as-is, numbers in decimal.
    pub fn config_text(&self, field: &str) -> Option<String> {
        match self.config.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Whether this is a trigger with both a contract address and an event name.
    pub fn is_armed_trigger(&self) -> bool {
        self.kind == NodeKind::Trigger
            && self.config_str(CONTRACT_ADDRESS).is_some()
            && self.config_str(EVENT_NAME).is_some()
    }
}
