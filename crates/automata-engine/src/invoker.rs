use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info};

use automata_core::error::{AutomataError, Result};
use automata_core::payload::Payload;
use automata_core::traits::{Classifier, Relay};
use automata_core::types::{NodeKind, RelayAction, TxReceipt};

use crate::branch::{BranchResult, DecisionOutcome};
use crate::graph::node::{AMOUNT, PROMPT, RECIPIENT};
use crate::graph::Node;

/// What a node produced when its action succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Triggers have no action; the payload passes straight through.
    Passthrough(Payload),
    /// A decision verdict wrapped around the judged payload.
    Decision(DecisionOutcome),
    /// The relay accepted a transfer or mint.
    Submitted { receipt: TxReceipt, payload: Payload },
}

impl ActionOutcome {
    /// The payload successors receive.
    pub fn into_payload(self) -> Payload {
        match self {
            Self::Passthrough(payload) | Self::Submitted { payload, .. } => payload,
            Self::Decision(outcome) => outcome.into_payload(),
        }
    }
}

/// Runs the effect of a single node, one executor per node kind.
pub struct ActionInvoker {
    classifier: Arc<dyn Classifier>,
    relay: Arc<dyn Relay>,
}

impl ActionInvoker {
    pub fn new(classifier: Arc<dyn Classifier>, relay: Arc<dyn Relay>) -> Self {
        Self { classifier, relay }
    }

    /// Perform `node`'s action on `payload`.
    pub async fn invoke(&self, node: &Node, payload: Payload) -> Result<ActionOutcome> {
        match node.kind {
            NodeKind::Trigger => Ok(ActionOutcome::Passthrough(payload)),
            NodeKind::Decision => self.decide(node, payload).await,
            NodeKind::Transfer => self.transfer(node, payload).await,
            NodeKind::Mint => self.mint(node, payload).await,
        }
    }

    async fn decide(&self, node: &Node, payload: Payload) -> Result<ActionOutcome> {
        let prompt = node
            .config_str(PROMPT)
            .ok_or_else(|| AutomataError::missing_config(&node.id, PROMPT))?;

        debug!(node_id = %node.id, prompt, "Asking classifier");
        let verdict = self
            .classifier
            .classify(prompt.to_string(), payload.clone())
            .await?;
        let result = BranchResult::from_verdict(&verdict)?;
        info!(node_id = %node.id, %result, "Decision made");

        Ok(ActionOutcome::Decision(DecisionOutcome::new(result, payload)))
    }

    async fn transfer(&self, node: &Node, payload: Payload) -> Result<ActionOutcome> {
        let amount = node
            .config_text(AMOUNT)
            .ok_or_else(|| AutomataError::missing_config(&node.id, AMOUNT))?;
        let to = resolve_recipient(node.config_str(RECIPIENT).unwrap_or_default(), &payload);

        self.submit(node, RelayAction::SendToken { to, amount }, payload)
            .await
    }

    async fn mint(&self, node: &Node, payload: Payload) -> Result<ActionOutcome> {
        let to = resolve_recipient(node.config_str(RECIPIENT).unwrap_or_default(), &payload);
        if to.trim().is_empty() {
            return Err(AutomataError::missing_config(&node.id, RECIPIENT));
        }

        self.submit(node, RelayAction::MintBadge { to }, payload)
            .await
    }

    async fn submit(
        &self,
        node: &Node,
        action: RelayAction,
        payload: Payload,
    ) -> Result<ActionOutcome> {
        info!(
            node_id = %node.id,
            action = action.name(),
            to = action.recipient(),
            "Submitting to relay"
        );
        let receipt = self.relay.submit(action).await.map_err(|e| match e {
            AutomataError::RelayFailure(_) => e,
            other => AutomataError::RelayFailure(other.to_string()),
        })?;
        Ok(ActionOutcome::Submitted { receipt, payload })
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*Trigger\.data\.to\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Resolve a recipient template against the payload.
///
/// A template containing `{{Trigger.data.to}}` resolves to the payload's `to`
/// field as a whole (empty if absent); text around the placeholder is not
/// kept, so `0x{{Trigger.data.to}}` cannot produce a doubled prefix. Any other
/// template is used literally.
pub fn resolve_recipient(template: &str, payload: &Payload) -> String {
    if !placeholder().is_match(template) {
        return template.trim().to_string();
    }
    payload.recipient().unwrap_or_default().trim().to_string()
}
