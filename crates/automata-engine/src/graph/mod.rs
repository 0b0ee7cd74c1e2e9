//! Workflow graph model.
//!
//! A workflow is a directed graph of typed `Node`s connected by `Edge`s.
//! Edges leaving a decision node carry a `sourceHandle` naming the branch
//! they belong to (`"true"` / `"false"`); all other edges are followed
//! unconditionally. The model itself is passive data: `SharedWorkflow`
//! wraps it for concurrent access by the editor and running traversals.

pub mod edge;
pub mod node;
pub mod shared;
pub mod workflow;

pub use edge::{Edge, EdgeFlavour};
pub use node::Node;
pub use shared::SharedWorkflow;
pub use workflow::Workflow;
