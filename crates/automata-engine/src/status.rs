use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use automata_core::error::{AutomataError, Result};
use automata_core::event::EventBus;
use automata_core::types::{NodeStatus, WorkflowEvent};

use crate::graph::SharedWorkflow;

/// Writes node statuses and announces every write on the event bus.
#[derive(Clone)]
pub struct StatusTracker {
    workflow: SharedWorkflow,
    event_bus: Arc<EventBus>,
}

impl StatusTracker {
    pub fn new(workflow: SharedWorkflow, event_bus: Arc<EventBus>) -> Self {
        Self {
            workflow,
            event_bus,
        }
    }

    /// Replace a node's status in place.
    ///
    /// Fails with `NotFound` when the node was deleted in the meantime.
    pub async fn set_status(&self, node_id: &str, status: NodeStatus) -> Result<()> {
        self.workflow
            .edit(|w| w.set_status(node_id, status))
            .await?;
        debug!(node_id, %status, "Node status changed");
        self.event_bus.publish(WorkflowEvent::NodeStatusChanged {
            node_id: node_id.to_string(),
            status,
        });
        Ok(())
    }

    /// Put every node back to `idle`.
    pub async fn reset_all(&self) {
        let changed = self.workflow.edit(|w| w.reset_statuses()).await;
        for node_id in changed {
            self.event_bus.publish(WorkflowEvent::NodeStatusChanged {
                node_id,
                status: NodeStatus::Idle,
            });
        }
    }

    /// Show a transient status now and schedule its terminal counterpart.
    ///
    /// The terminal write runs on its own task: dropping the caller does not
    /// leave the node stuck in a transient state.
    pub async fn flash(
        &self,
        node_id: &str,
        transient: NodeStatus,
        delay: Duration,
    ) -> Result<Settle> {
        debug_assert!(transient.is_transient());
        self.set_status(node_id, transient).await?;

        let terminal = transient.settled();
        let tracker = self.clone();
        let id = node_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracker.set_status(&id, terminal).await
        });

        Ok(Settle {
            node_id: node_id.to_string(),
            terminal,
            handle,
        })
    }
}

/// The scheduled second half of a transient → terminal transition.
#[must_use = "a Settle should be awaited before continuing past the node"]
pub struct Settle {
    node_id: String,
    terminal: NodeStatus,
    handle: JoinHandle<Result<()>>,
}

impl Settle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The status the node will end up in.
    pub fn terminal(&self) -> NodeStatus {
        self.terminal
    }

    /// Wait for the terminal status to be written.
    pub async fn wait(self) -> Result<NodeStatus> {
        match self.handle.await {
            Ok(result) => result.map(|()| self.terminal),
            Err(e) => Err(AutomataError::Task(e.to_string())),
        }
    }
}
