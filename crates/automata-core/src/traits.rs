use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::payload::Payload;
use crate::types::{RelayAction, TriggerEvent, TxReceipt};

/// The AI classifier behind decision nodes.
pub trait Classifier: Send + Sync + 'static {
    /// Ask the classifier a yes/no question about `data`.
    ///
    /// Returns the raw verdict text. The caller decides whether it honours
    /// the `"TRUE"`/`"FALSE"` contract.
    fn classify(&self, prompt: String, data: Payload) -> BoxFuture<'_, Result<String>>;
}

/// Submits signed ledger transactions on the workflow's behalf.
pub trait Relay: Send + Sync + 'static {
    /// Submit one action and wait for its receipt.
    fn submit(&self, action: RelayAction) -> BoxFuture<'_, Result<TxReceipt>>;
}

/// An external feed of events that start workflow runs.
pub trait TriggerSource: Send + Sync + 'static {
    /// Source name (e.g., "stdin", "chain").
    fn name(&self) -> &str;

    /// Start producing events, sending them via the provided sender.
    fn start(&self, tx: mpsc::Sender<TriggerEvent>) -> BoxFuture<'_, Result<()>>;

    /// Stop the source gracefully.
    fn stop(&self) -> BoxFuture<'_, Result<()>>;
}
