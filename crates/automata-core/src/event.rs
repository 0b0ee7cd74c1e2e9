use crate::types::WorkflowEvent;

/// Fan-out of `WorkflowEvent`s to run observers.
///
/// The status tracker, executor and trigger dispatcher publish here; the CLI
/// printer and tests subscribe. Every subscriber sees every status change,
/// failure and run lifecycle event published after it subscribed. A slow
/// subscriber lags and drops the oldest events instead of stalling a run.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    /// `capacity` is the number of events a subscriber may fall behind by.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // Runs proceed with nobody watching
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
