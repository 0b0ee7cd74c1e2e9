use std::sync::Arc;

use tokio::sync::RwLock;

use automata_core::error::Result;

use super::edge::Edge;
use super::node::Node;
use super::workflow::Workflow;

/// A workflow shared between its editing session and running traversals.
///
/// All access goes through an async `RwLock`, so a status write or config
/// edit is never observed half-applied. Reads hand out clones; nothing
/// holds the lock across an await on a collaborator.
#[derive(Clone, Default)]
pub struct SharedWorkflow {
    inner: Arc<RwLock<Workflow>>,
}

impl SharedWorkflow {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            inner: Arc::new(RwLock::new(workflow)),
        }
    }

    /// Snapshot of a single node.
    pub async fn node(&self, id: &str) -> Result<Node> {
        self.inner.read().await.node(id).cloned()
    }

    /// Snapshot of the edges leaving `id`, in insertion order.
    pub async fn successors_of(&self, id: &str) -> Vec<Edge> {
        self.inner
            .read()
            .await
            .successors_of(id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Snapshot of the whole graph.
    pub async fn snapshot(&self) -> Workflow {
        self.inner.read().await.clone()
    }

    /// Apply an edit under the write lock.
    ///
    /// This is the entry point for the external editor (adding nodes,
    /// changing config, deleting nodes between or during runs).
    pub async fn edit<T>(&self, f: impl FnOnce(&mut Workflow) -> T) -> T {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }
}
