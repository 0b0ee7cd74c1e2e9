use std::sync::Arc;

use automata_core::config::EngineConfig;
use automata_core::types::{NodeKind, NodeStatus, RelayAction, TriggerEvent};
use automata_core::{EventBus, Payload};
use automata_engine::{matching_triggers, ActionInvoker, SharedWorkflow, Workflow, WorkflowExecutor};
use automata_test_utils::{payload_to, RecordingRelay, ScriptedClassifier};

const LOYALTY: &str = include_str!("../demos/loyalty-workflow.json");

fn executor(workflow: Workflow, verdict: &str) -> (WorkflowExecutor, Arc<RecordingRelay>) {
    let relay = Arc::new(RecordingRelay::new());
    let executor = WorkflowExecutor::new(
        SharedWorkflow::new(workflow),
        ActionInvoker::new(Arc::new(ScriptedClassifier::always(verdict)), relay.clone()),
        Arc::new(EventBus::default()),
        &EngineConfig::default(),
    );
    (executor, relay)
}

#[test]
fn test_editor_document_loads() {
    let wf = Workflow::from_json(LOYALTY).expect("parse workflow");

    let kinds: Vec<NodeKind> = wf.nodes().iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Trigger,
            NodeKind::Decision,
            NodeKind::Transfer,
            NodeKind::Mint
        ]
    );
    assert!(wf.nodes().iter().all(|n| n.status == NodeStatus::Idle));
    assert_eq!(wf.edges().len(), 3);
    assert!(wf.is_active());
    assert_eq!(wf.node("reward-1").unwrap().config_text("amount").as_deref(), Some("5"));
}

#[test]
fn test_dangling_edge_rejected() {
    let doc = r#"{"nodes":[{"id":"a","type":"trigger"}],"edges":[{"source":"a","target":"b"}]}"#;
    assert!(Workflow::from_json(doc).is_err());
}

#[test]
fn test_chain_event_matches_armed_trigger() {
    let wf = Workflow::from_json(LOYALTY).unwrap();
    let event: TriggerEvent = serde_json::from_str(
        r#"{"contractAddress":"0x5425890298AED601595A70AB815C96711A31BC65","eventName":"Transfer"}"#,
    )
    .unwrap();
    assert_eq!(matching_triggers(&wf, &event), vec!["trigger-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_loyalty_flow_rewards_and_mints() {
    let (executor, relay) = executor(Workflow::from_json(LOYALTY).unwrap(), "TRUE");

    let report = executor
        .execute_workflow("trigger-1", payload_to("0xCAFE"))
        .await;

    assert!(report.succeeded());
    assert_eq!(
        report.executed(),
        vec!["trigger-1", "decision-1", "reward-1", "badge-1"]
    );
    assert_eq!(
        relay.actions(),
        vec![
            RelayAction::SendToken {
                to: "0xCAFE".into(),
                amount: "5".into()
            },
            RelayAction::MintBadge { to: "0xCAFE".into() },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_loyalty_flow_small_transfer_stops_at_decision() {
    let (executor, relay) = executor(Workflow::from_json(LOYALTY).unwrap(), "FALSE");

    let report = executor.execute_workflow("trigger-1", Payload::new()).await;

    assert!(report.succeeded());
    assert_eq!(report.executed(), vec!["trigger-1", "decision-1"]);
    assert!(relay.actions().is_empty());
    assert_eq!(
        executor.workflow().node("badge-1").await.unwrap().status,
        NodeStatus::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn test_edit_between_runs_is_picked_up() {
    let (executor, relay) = executor(Workflow::from_json(LOYALTY).unwrap(), "TRUE");

    executor
        .workflow()
        .edit(|w| w.update_config("badge-1", "recipient", serde_json::json!("0xFIXED")))
        .await
        .unwrap();
    executor
        .execute_workflow("trigger-1", payload_to("0xCAFE"))
        .await;

    assert_eq!(
        relay.actions().last(),
        Some(&RelayAction::MintBadge { to: "0xFIXED".into() })
    );
}
