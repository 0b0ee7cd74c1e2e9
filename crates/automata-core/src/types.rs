use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::Payload;

/// Unique identifier for one traversal of a workflow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of node kinds a workflow can contain.
///
/// The editor palette names (`onchain-event`, `ai-decision`, ...) are
/// accepted as aliases so editor documents load unchanged.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[serde(alias = "onchain-event")]
    Trigger,
    #[serde(alias = "ai-decision")]
    Decision,
    #[serde(alias = "send-usdt", alias = "send-token")]
    Transfer,
    #[serde(alias = "mint-nft")]
    Mint,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Decision => "decision",
            Self::Transfer => "transfer",
            Self::Mint => "mint",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status attached to every node.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Fail,
    /// Display flash shown before settling into `Success`.
    SuccessTransient,
    /// Display flash shown before settling into `Fail`.
    FailTransient,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SuccessTransient | Self::FailTransient)
    }

    /// The terminal status a transient flash settles into.
    pub fn settled(&self) -> Self {
        match self {
            Self::SuccessTransient => Self::Success,
            Self::FailTransient => Self::Fail,
            other => *other,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Fail => "fail",
            Self::SuccessTransient => "success_transient",
            Self::FailTransient => "fail_transient",
        };
        f.write_str(s)
    }
}

/// A request for the relay collaborator, in its wire shape
/// (`{"action": "sendToken", "params": {...}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "camelCase")]
pub enum RelayAction {
    SendToken { to: String, amount: String },
    MintBadge { to: String },
}

impl RelayAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendToken { .. } => "sendToken",
            Self::MintBadge { .. } => "mintBadge",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Self::SendToken { to, .. } | Self::MintBadge { to } => to,
        }
    }
}

/// Result of a successful relay submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxReceipt {
    #[serde(default, rename = "txHash")]
    pub tx_hash: Option<String>,
}

/// An external signal asking for one or more workflow runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Name of the trigger source that produced the event.
    #[serde(default)]
    pub source: String,
    /// Contract the event was observed on.
    #[serde(default, rename = "contractAddress")]
    pub contract_address: Option<String>,
    /// Event name, e.g. `Transfer`.
    #[serde(default, rename = "eventName")]
    pub event_name: Option<String>,
    /// Start this trigger node directly instead of matching armed triggers.
    #[serde(default, rename = "triggerNode")]
    pub trigger_node: Option<String>,
    /// Event data handed to the run as its initial payload.
    #[serde(default)]
    pub payload: Payload,
}

/// Events published while workflows execute.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A traversal started at `start_node`.
    RunStarted { run_id: RunId, start_node: String },
    /// A node's status was written.
    NodeStatusChanged { node_id: String, status: NodeStatus },
    /// A node failed; its descendants will not run.
    NodeFailed {
        run_id: RunId,
        node_id: String,
        error: String,
    },
    /// A decision result matched no outgoing edge.
    BranchUnmatched {
        run_id: RunId,
        node_id: String,
        result: String,
    },
    /// The relay accepted a submission for a node.
    TransactionSubmitted {
        run_id: RunId,
        node_id: String,
        tx_hash: Option<String>,
    },
    /// The cycle guard refused to enter a node again.
    NodeSkipped {
        run_id: RunId,
        node_id: String,
        reason: String,
    },
    /// A traversal reached every terminal.
    RunComplete {
        run_id: RunId,
        executed: usize,
        failed: usize,
    },
    /// A trigger event started a run.
    TriggerFired { source: String, trigger_node: String },
}
