use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use automata_core::error::{AutomataError, Result};
use automata_core::types::NodeStatus;

use super::edge::Edge;
use super::node::Node;

/// The graph model: nodes and edges in insertion order.
///
/// Pure data. Every edge references existing nodes; ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkflowDocument")]
pub struct Workflow {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Unvalidated wire form of a workflow.
#[derive(Deserialize)]
struct WorkflowDocument {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl TryFrom<WorkflowDocument> for Workflow {
    type Error = AutomataError;

    fn try_from(doc: WorkflowDocument) -> Result<Self> {
        Self::from_parts(doc.nodes, doc.edges)
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workflow, validating ids and edge endpoints.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let mut workflow = Self::new();
        for node in nodes {
            workflow.add_node(node)?;
        }
        for edge in edges {
            workflow.add_edge(edge)?;
        }
        Ok(workflow)
    }

    /// Parse a workflow document (`{"nodes": [...], "edges": [...]}`).
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| AutomataError::NotFound(id.to_string()))
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| AutomataError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// All edges leaving `id`, in insertion order.
    pub fn successors_of(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == id).collect()
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if node.id.is_empty() {
            return Err(AutomataError::InvalidWorkflow("node id is empty".into()));
        }
        if self.contains(&node.id) {
            return Err(AutomataError::InvalidWorkflow(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_edge(&mut self, mut edge: Edge) -> Result<()> {
        edge.ensure_id();
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains(endpoint) {
                return Err(AutomataError::InvalidWorkflow(format!(
                    "edge '{}' references unknown node '{}'",
                    edge.id, endpoint
                )));
            }
        }
        if self.edges.iter().any(|e| e.id == edge.id) {
            return Err(AutomataError::InvalidWorkflow(format!(
                "duplicate edge id '{}'",
                edge.id
            )));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| AutomataError::NotFound(id.to_string()))?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Ok(self.nodes.remove(pos))
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AutomataError::InvalidWorkflow(format!("unknown edge '{}'", id)))?;
        Ok(self.edges.remove(pos))
    }

    /// Set one config field, keeping every other node attribute.
    pub fn update_config(&mut self, id: &str, field: impl Into<String>, value: Value) -> Result<()> {
        self.node_mut(id)?.config.insert(field.into(), value);
        Ok(())
    }

    /// Replace a node's status in place.
    pub fn set_status(&mut self, id: &str, status: NodeStatus) -> Result<()> {
        self.node_mut(id)?.status = status;
        Ok(())
    }

    /// Put every node back to `idle`, returning the ids that changed.
    pub fn reset_statuses(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        for node in &mut self.nodes {
            if node.status != NodeStatus::Idle {
                node.status = NodeStatus::Idle;
                changed.push(node.id.clone());
            }
        }
        changed
    }

    /// Triggers configured with both a contract address and an event name.
    pub fn armed_triggers(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_armed_trigger()).collect()
    }

    /// Whether any trigger is armed, i.e. the workflow listens for events.
    pub fn is_active(&self) -> bool {
        self.nodes.iter().any(|n| n.is_armed_trigger())
    }

    /// Node ids reachable from `start` along any edge, `start` included.
    pub fn reachable_from(&self, start: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(id) = stack.pop() {
            if !self.contains(&id) || !seen.insert(id.clone()) {
                continue;
            }
            stack.extend(self.successors_of(&id).iter().map(|e| e.target.clone()));
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{CONTRACT_ADDRESS, EVENT_NAME, PROMPT};

    fn sample() -> Workflow {
        Workflow::from_parts(
            vec![
                Node::trigger("t"),
                Node::decision("gate", "Is it big"),
                Node::transfer("pay", "{{Trigger.data.to}}", "5"),
                Node::mint("badge", "0xB"),
            ],
            vec![
                Edge::new("t", "gate"),
                Edge::branch("gate", "true", "pay"),
                Edge::branch("gate", "false", "badge"),
                Edge::new("pay", "badge"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_graph_construction() {
        let wf = sample();
        assert_eq!(wf.nodes().len(), 4);
        assert_eq!(wf.edges().len(), 4);
        assert!(wf.node("gate").is_ok());
        assert!(matches!(wf.node("nope"), Err(AutomataError::NotFound(_))));
    }

    #[test]
    fn test_successors_in_insertion_order() {
        let wf = sample();
        let targets: Vec<&str> = wf
            .successors_of("gate")
            .iter()
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(targets, vec!["pay", "badge"]);
        assert!(wf.successors_of("badge").is_empty());
        assert!(wf.successors_of("unknown").is_empty());
    }

    #[test]
    fn test_rejects_dangling_and_duplicate() {
        let mut wf = sample();
        let err = wf.add_edge(Edge::new("t", "ghost")).unwrap_err();
        assert!(matches!(err, AutomataError::InvalidWorkflow(_)));

        let err = wf.add_node(Node::trigger("t")).unwrap_err();
        assert!(matches!(err, AutomataError::InvalidWorkflow(_)));

        let err = wf.add_edge(Edge::new("t", "gate")).unwrap_err();
        assert!(matches!(err, AutomataError::InvalidWorkflow(_)));
    }

    #[test]
    fn test_cycles_are_structurally_allowed() {
        let mut wf = sample();
        wf.add_edge(Edge::new("badge", "t")).unwrap();
        assert_eq!(wf.reachable_from("badge").len(), 4);
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut wf = sample();
        let removed = wf.remove_node("pay").unwrap();
        assert_eq!(removed.id, "pay");
        assert!(wf.edges().iter().all(|e| e.source != "pay" && e.target != "pay"));
        assert_eq!(wf.edges().len(), 2);
        assert!(wf.remove_node("pay").is_err());
    }

    #[test]
    fn test_remove_edge() {
        let mut wf = sample();
        wf.remove_edge("e-gate-false-badge").unwrap();
        assert_eq!(wf.successors_of("gate").len(), 1);
        assert!(wf.remove_edge("e-gate-false-badge").is_err());
    }

    #[test]
    fn test_update_config_preserves_other_fields() {
        let mut wf = sample();
        wf.set_status("gate", NodeStatus::Success).unwrap();
        wf.update_config("gate", PROMPT, serde_json::json!("New question"))
            .unwrap();

        let node = wf.node("gate").unwrap();
        assert_eq!(node.config_str(PROMPT), Some("New question"));
        assert_eq!(node.status, NodeStatus::Success);
        assert!(wf.update_config("ghost", PROMPT, serde_json::json!("x")).is_err());
    }

    #[test]
    fn test_reset_statuses() {
        let mut wf = sample();
        wf.set_status("t", NodeStatus::Success).unwrap();
        wf.set_status("pay", NodeStatus::Fail).unwrap();
        let changed = wf.reset_statuses();
        assert_eq!(changed, vec!["t".to_string(), "pay".to_string()]);
        assert!(wf.nodes().iter().all(|n| n.status == NodeStatus::Idle));
    }

    #[test]
    fn test_armed_triggers() {
        let mut wf = sample();
        assert!(!wf.is_active());
        wf.update_config("t", CONTRACT_ADDRESS, serde_json::json!("0xC"))
            .unwrap();
        wf.update_config("t", EVENT_NAME, serde_json::json!("Transfer"))
            .unwrap();
        assert!(wf.is_active());
        assert_eq!(wf.armed_triggers().len(), 1);
    }

    #[test]
    fn test_from_json_validates() {
        let wf = Workflow::from_json(
            r#"{
                "nodes": [
                    {"id": "t", "type": "onchain-event", "position": {"x": 0, "y": 0}},
                    {"id": "m", "type": "mint-nft", "data": {"recipient": "{{Trigger.data.to}}"}}
                ],
                "edges": [{"source": "t", "target": "m"}]
            }"#,
        )
        .unwrap();
        assert_eq!(wf.edges()[0].id, "e-t-m");

        let err = Workflow::from_json(
            r#"{"nodes": [{"id": "t", "type": "trigger"}], "edges": [{"source": "t", "target": "x"}]}"#,
        );
        assert!(err.is_err());
    }
}
