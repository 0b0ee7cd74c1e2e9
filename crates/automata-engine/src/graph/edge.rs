use serde::{Deserialize, Serialize};

/// Source handles that carry execution flow rather than data.
const EXECUTION_HANDLES: [&str; 3] = ["true", "false", "on-success"];

/// A directed edge between two nodes of the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier. Generated from the endpoints when left empty.
    #[serde(default)]
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Named output port of the source node; `None` means always follow.
    #[serde(default, rename = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

/// How the editor draws an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFlavour {
    /// Carries control flow (`true`, `false`, `on-success` handles).
    Execution,
    /// Carries data only.
    Data,
}

impl Edge {
    /// Create an unlabeled edge.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: default_id(&source, None, &target),
            source,
            target,
            source_handle: None,
        }
    }

    /// Create an edge leaving a named output port of the source node.
    pub fn branch(
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let handle = handle.into();
        Self {
            id: default_id(&source, Some(&handle), &target),
            source,
            target,
            source_handle: Some(handle),
        }
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn flavour(&self) -> EdgeFlavour {
        match self.source_handle.as_deref() {
            Some(h) if EXECUTION_HANDLES.contains(&h) => EdgeFlavour::Execution,
            _ => EdgeFlavour::Data,
        }
    }

    /// Fill in the generated id if none was given.
    pub(crate) fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = default_id(&self.source, self.source_handle.as_deref(), &self.target);
        }
    }
}

fn default_id(source: &str, handle: Option<&str>, target: &str) -> String {
    match handle {
        Some(h) => format!("e-{}-{}-{}", source, h, target),
        None => format!("e-{}-{}", source, target),
    }
}
