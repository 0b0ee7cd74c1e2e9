pub mod branch;
pub mod executor;
pub mod graph;
pub mod invoker;
pub mod status;
pub mod trigger;

pub use branch::{BranchResult, DecisionOutcome};
pub use executor::{NodeRecord, RunContext, RunReport, WorkflowExecutor};
pub use graph::{Edge, EdgeFlavour, Node, SharedWorkflow, Workflow};
pub use invoker::{ActionInvoker, ActionOutcome};
pub use status::{Settle, StatusTracker};
pub use trigger::{
    matching_triggers, DispatchSummary, LineTriggerSource, StdinTriggerSource, TriggerDispatcher,
};
