use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use automata_core::config::EngineConfig;
use automata_core::error::{AutomataError, Result};
use automata_core::event::EventBus;
use automata_core::payload::Payload;
use automata_core::types::{NodeKind, NodeStatus, RunId, WorkflowEvent};

use crate::branch;
use crate::graph::{Edge, Node, SharedWorkflow};
use crate::invoker::{ActionInvoker, ActionOutcome};
use crate::status::StatusTracker;

/// Result of executing a single node.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Which node was executed.
    pub node_id: String,
    pub kind: NodeKind,
    /// Terminal status the node settled into.
    pub status: NodeStatus,
    /// Failure detail, when the node failed.
    pub error: Option<String>,
    /// Branch taken, for decision nodes.
    pub branch: Option<String>,
    /// Relay transaction hash, for transfer and mint nodes.
    pub tx_hash: Option<String>,
    /// Execution time in milliseconds, display delay included.
    pub elapsed_ms: u64,
}

impl NodeRecord {
    pub fn succeeded(&self) -> bool {
        self.status == NodeStatus::Success
    }
}

/// Result of one traversal.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub start_node: String,
    /// Wall-clock time the run started.
    pub started_at: DateTime<Utc>,
    /// Per-node results in execution order.
    pub records: Vec<NodeRecord>,
    /// Nodes the cycle guard refused to enter.
    pub skipped: Vec<String>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

impl RunReport {
    /// Whether every executed node reached `success`.
    pub fn succeeded(&self) -> bool {
        self.records.iter().all(|r| r.succeeded())
    }

    pub fn record(&self, node_id: &str) -> Option<&NodeRecord> {
        self.records.iter().find(|r| r.node_id == node_id)
    }

    /// Ids of the executed nodes, in execution order.
    pub fn executed(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.node_id.as_str()).collect()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| !r.succeeded()).count()
    }
}

/// Per-run state threaded through the recursion.
///
/// Holds the cycle guard: each node runs at most once per run, and no chain
/// descends deeper than `max_depth`.
#[derive(Debug)]
pub struct RunContext {
    run_id: RunId,
    visited: HashSet<String>,
    depth: usize,
    max_depth: usize,
    records: Vec<NodeRecord>,
    skipped: Vec<String>,
}

impl RunContext {
    pub fn new(max_depth: usize) -> Self {
        Self {
            run_id: RunId::new(),
            visited: HashSet::new(),
            depth: 0,
            max_depth,
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn has_visited(&self, node_id: &str) -> bool {
        self.visited.contains(node_id)
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    fn into_report(
        self,
        start_node: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            start_node,
            started_at,
            records: self.records,
            skipped: self.skipped,
            total_elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Walks a workflow from a start node.
///
/// Each node is dispatched to the `ActionInvoker`; on success the node
/// flashes `success_transient`, settles into `success` after the display
/// delay, and its successors run one after another in edge order. On failure
/// it flashes `fail_transient`, settles into `fail`, and nothing downstream
/// runs. Successors never run concurrently, which keeps relay submissions
/// from one signer in order.
#[derive(Clone)]
pub struct WorkflowExecutor {
    workflow: SharedWorkflow,
    tracker: StatusTracker,
    invoker: Arc<ActionInvoker>,
    event_bus: Arc<EventBus>,
    display_delay: Duration,
    max_depth: usize,
}

impl WorkflowExecutor {
    pub fn new(
        workflow: SharedWorkflow,
        invoker: ActionInvoker,
        event_bus: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            tracker: StatusTracker::new(workflow.clone(), event_bus.clone()),
            workflow,
            invoker: Arc::new(invoker),
            event_bus,
            display_delay: config.display_delay(),
            max_depth: config.max_depth,
        }
    }

    pub fn workflow(&self) -> &SharedWorkflow {
        &self.workflow
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Start a new run at `start_node` with `payload`.
    ///
    /// Never fails: node-level errors are recorded in the report and in node
    /// statuses, and a vanished start node simply yields an empty report.
    pub async fn execute_workflow(&self, start_node: &str, payload: Payload) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut ctx = RunContext::new(self.max_depth);

        info!(run_id = %ctx.run_id, start_node, "Workflow run started");
        self.event_bus.publish(WorkflowEvent::RunStarted {
            run_id: ctx.run_id.clone(),
            start_node: start_node.to_string(),
        });

        self.run_node(start_node, payload, &mut ctx).await;

        let report = ctx.into_report(start_node.to_string(), started_at, start.elapsed());
        info!(
            run_id = %report.run_id,
            executed = report.records.len(),
            failed = report.failed(),
            elapsed_ms = report.total_elapsed_ms,
            "Workflow run complete"
        );
        self.event_bus.publish(WorkflowEvent::RunComplete {
            run_id: report.run_id.clone(),
            executed: report.records.len(),
            failed: report.failed(),
        });
        report
    }

    /// Execute `node_id` and everything downstream of it within `ctx`.
    pub fn run_node<'a>(
        &'a self,
        node_id: &'a str,
        payload: Payload,
        ctx: &'a mut RunContext,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if ctx.depth >= ctx.max_depth {
                self.skip(ctx, node_id, "maximum depth reached");
                return;
            }
            if !ctx.visited.insert(node_id.to_string()) {
                self.skip(ctx, node_id, "already executed in this run");
                return;
            }

            // A missing node is a benign race with the editor: stop quietly.
            let node = match self.workflow.node(node_id).await {
                Ok(node) => node,
                Err(e) => {
                    debug!(node_id, error = %e, "Node vanished, stopping branch");
                    return;
                }
            };
            if let Err(e) = self.tracker.set_status(&node.id, NodeStatus::Pending).await {
                debug!(node_id, error = %e, "Node vanished, stopping branch");
                return;
            }

            info!(run_id = %ctx.run_id, node_id, kind = %node.kind, "Executing node");
            let node_start = Instant::now();
            let result = self.invoker.invoke(&node, payload).await;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.fail(ctx, &node, e, node_start).await;
                    return;
                }
            };

            let settled = if node.kind == NodeKind::Trigger {
                self.tracker
                    .set_status(&node.id, NodeStatus::Success)
                    .await
                    .map(|()| NodeStatus::Success)
            } else {
                self.flash(&node.id, NodeStatus::SuccessTransient).await
            };
            if let Err(e) = settled {
                debug!(node_id, error = %e, "Node vanished before settling, stopping branch");
                return;
            }

            let outgoing = self.workflow.successors_of(&node.id).await;
            let mut record = NodeRecord {
                node_id: node.id.clone(),
                kind: node.kind,
                status: NodeStatus::Success,
                error: None,
                branch: None,
                tx_hash: None,
                elapsed_ms: node_start.elapsed().as_millis() as u64,
            };

            let (next, forwarded) = match outcome {
                ActionOutcome::Decision(decision) => {
                    let taken = branch::resolve(decision.result, outgoing);
                    record.branch = Some(decision.result.as_str().to_string());
                    if taken.is_empty() {
                        info!(
                            run_id = %ctx.run_id,
                            node_id,
                            result = %decision.result,
                            "No edge for decision result, branch ends here"
                        );
                        self.event_bus.publish(WorkflowEvent::BranchUnmatched {
                            run_id: ctx.run_id.clone(),
                            node_id: node.id.clone(),
                            result: decision.result.as_str().to_string(),
                        });
                    }
                    (taken, decision.into_payload())
                }
                ActionOutcome::Submitted { receipt, payload } => {
                    info!(
                        run_id = %ctx.run_id,
                        node_id,
                        tx_hash = receipt.tx_hash.as_deref().unwrap_or("-"),
                        "Relay accepted submission"
                    );
                    self.event_bus.publish(WorkflowEvent::TransactionSubmitted {
                        run_id: ctx.run_id.clone(),
                        node_id: node.id.clone(),
                        tx_hash: receipt.tx_hash.clone(),
                    });
                    record.tx_hash = receipt.tx_hash;
                    (outgoing, payload)
                }
                ActionOutcome::Passthrough(payload) => (outgoing, payload),
            };
            ctx.records.push(record);

            self.descend(next, forwarded, ctx).await;
        })
    }

    /// Run successors strictly one after another, in edge order.
    async fn descend(&self, edges: Vec<Edge>, payload: Payload, ctx: &mut RunContext) {
        if edges.is_empty() {
            return;
        }
        ctx.depth += 1;
        for edge in edges {
            debug!(edge_id = %edge.id, target = %edge.target, "Following edge");
            self.run_node(&edge.target, payload.clone(), ctx).await;
        }
        ctx.depth -= 1;
    }

    async fn fail(&self, ctx: &mut RunContext, node: &Node, e: AutomataError, started: Instant) {
        if e.is_silent() {
            debug!(node_id = %node.id, error = %e, "Node vanished, stopping branch");
            return;
        }

        error!(run_id = %ctx.run_id, node_id = %node.id, error = %e, "Node failed");
        self.event_bus.publish(WorkflowEvent::NodeFailed {
            run_id: ctx.run_id.clone(),
            node_id: node.id.clone(),
            error: e.to_string(),
        });

        if let Err(settle_err) = self.flash(&node.id, NodeStatus::FailTransient).await {
            debug!(node_id = %node.id, error = %settle_err, "Node vanished before settling");
            return;
        }
        ctx.records.push(NodeRecord {
            node_id: node.id.clone(),
            kind: node.kind,
            status: NodeStatus::Fail,
            error: Some(e.to_string()),
            branch: None,
            tx_hash: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }

    /// Flash a transient status and wait for it to settle.
    async fn flash(&self, node_id: &str, transient: NodeStatus) -> Result<NodeStatus> {
        self.tracker
            .flash(node_id, transient, self.display_delay)
            .await?
            .wait()
            .await
    }

    fn skip(&self, ctx: &mut RunContext, node_id: &str, reason: &str) {
        warn!(run_id = %ctx.run_id, node_id, reason, "Not entering node");
        ctx.skipped.push(node_id.to_string());
        self.event_bus.publish(WorkflowEvent::NodeSkipped {
            run_id: ctx.run_id.clone(),
            node_id: node_id.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Workflow;
    use automata_test_utils::{payload_to, RecordingRelay, ScriptedClassifier};

    fn executor(workflow: Workflow, verdict: &str) -> (WorkflowExecutor, Arc<RecordingRelay>) {
        let relay = Arc::new(RecordingRelay::new());
        let invoker = ActionInvoker::new(Arc::new(ScriptedClassifier::always(verdict)), relay.clone());
        let config = EngineConfig {
            display_delay_ms: 1500,
            ..EngineConfig::default()
        };
        (
            WorkflowExecutor::new(
                SharedWorkflow::new(workflow),
                invoker,
                Arc::new(EventBus::default()),
                &config,
            ),
            relay,
        )
    }

    #[test]
    fn test_run_context_guard_state() {
        let mut ctx = RunContext::new(3);
        assert!(!ctx.has_visited("a"));
        ctx.visited.insert("a".into());
        assert!(ctx.has_visited("a"));
        assert!(ctx.records().is_empty());
    }

    #[test]
    fn test_report_helpers() {
        let record = |id: &str, status| NodeRecord {
            node_id: id.into(),
            kind: NodeKind::Mint,
            status,
            error: None,
            branch: None,
            tx_hash: None,
            elapsed_ms: 0,
        };
        let report = RunReport {
            run_id: RunId::from_str("r"),
            start_node: "a".into(),
            started_at: Utc::now(),
            records: vec![record("a", NodeStatus::Success), record("b", NodeStatus::Fail)],
            skipped: vec![],
            total_elapsed_ms: 0,
        };
        assert!(!report.succeeded());
        assert_eq!(report.failed(), 1);
        assert_eq!(report.executed(), vec!["a", "b"]);
        assert!(report.record("b").is_some());
        assert!(report.record("c").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_depth_bound_stops_chain() {
        let nodes = (0..5).map(|i| Node::mint(format!("m{}", i), "0x1")).collect();
        let edges = (0..4)
            .map(|i| Edge::new(format!("m{}", i), format!("m{}", i + 1)))
            .collect();
        let (mut executor, relay) = executor(Workflow::from_parts(nodes, edges).unwrap(), "TRUE");
        executor.max_depth = 3;

        let report = executor.execute_workflow("m0", Payload::new()).await;
        assert_eq!(report.executed(), vec!["m0", "m1", "m2"]);
        assert_eq!(report.skipped, vec!["m3".to_string()]);
        assert_eq!(relay.actions().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_start_node_is_silent() {
        let (executor, relay) = executor(Workflow::new(), "TRUE");
        let report = executor.execute_workflow("ghost", payload_to("0x1")).await;
        assert!(report.records.is_empty());
        assert!(report.succeeded());
        assert!(relay.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decision_record_carries_branch() {
        let wf = Workflow::from_parts(
            vec![Node::decision("g", "q"), Node::mint("m", "0x1")],
            vec![Edge::branch("g", "true", "m")],
        )
        .unwrap();
        let (executor, _relay) = executor(wf, "TRUE");
        let report = executor.execute_workflow("g", Payload::new()).await;
        assert_eq!(report.record("g").unwrap().branch.as_deref(), Some("true"));
        assert!(report.record("m").unwrap().tx_hash.is_some());
    }
}
