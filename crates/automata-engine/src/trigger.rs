use std::collections::HashMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use automata_core::error::{AutomataError, Result};
use automata_core::event::EventBus;
use automata_core::traits::TriggerSource;
use automata_core::types::{NodeKind, TriggerEvent, WorkflowEvent};

use crate::executor::{RunReport, WorkflowExecutor};
use crate::graph::node::{CONTRACT_ADDRESS, EVENT_NAME};
use crate::graph::Workflow;

/// Trigger nodes an event should start, in graph order.
///
/// An event naming a trigger node starts exactly that node. Otherwise every
/// armed trigger whose contract address (case-insensitive) and event name
/// match is started; a field the event leaves out matches anything.
pub fn matching_triggers(workflow: &Workflow, event: &TriggerEvent) -> Vec<String> {
    if let Some(ref id) = event.trigger_node {
        return match workflow.node(id) {
            Ok(node) if node.kind == NodeKind::Trigger => vec![node.id.clone()],
            Ok(node) => {
                warn!(node_id = %id, kind = %node.kind, "Event names a node that is not a trigger");
                Vec::new()
            }
            Err(_) => {
                warn!(node_id = %id, "Event names an unknown trigger");
                Vec::new()
            }
        };
    }

    workflow
        .armed_triggers()
        .into_iter()
        .filter(|node| {
            let contract_ok = event.contract_address.as_deref().map_or(true, |addr| {
                node.config_str(CONTRACT_ADDRESS)
                    .is_some_and(|c| c.eq_ignore_ascii_case(addr.trim()))
            });
            let event_ok = event
                .event_name
                .as_deref()
                .map_or(true, |name| node.config_str(EVENT_NAME) == Some(name.trim()));
            contract_ok && event_ok
        })
        .map(|node| node.id.clone())
        .collect()
}

/// Counts of the runs a dispatcher started and saw finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Runs that completed.
    pub runs: usize,
    /// Completed runs with at least one failed node.
    pub failed: usize,
}

/// Starts workflow runs for events coming from trigger sources.
pub struct TriggerDispatcher {
    executor: WorkflowExecutor,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    sources: HashMap<String, Arc<dyn TriggerSource>>,
    report_tx: Option<mpsc::Sender<RunReport>>,
}

impl TriggerDispatcher {
    pub fn new(executor: WorkflowExecutor, cancel: CancellationToken) -> Self {
        Self {
            event_bus: executor.event_bus().clone(),
            executor,
            cancel,
            sources: HashMap::new(),
            report_tx: None,
        }
    }

    /// Hand every run report to `tx` as soon as the run completes.
    pub fn set_report_sink(&mut self, tx: mpsc::Sender<RunReport>) {
        self.report_tx = Some(tx);
    }

    /// Add a trigger source.
    pub fn add_source(&mut self, source: Arc<dyn TriggerSource>) {
        self.sources.insert(source.name().to_string(), source);
    }

    /// Start all sources and dispatch their events until cancelled or until
    /// every source has finished. Completed runs are reaped while events keep
    /// arriving; runs still in flight are awaited before returning.
    pub async fn run(self) -> Result<DispatchSummary> {
        let (tx, mut rx) = mpsc::channel::<TriggerEvent>(256);

        for (name, source) in &self.sources {
            info!(source = %name, "Starting trigger source");
            if let Err(e) = source.start(tx.clone()).await {
                error!(source = %name, error = %e, "Failed to start trigger source");
            }
        }

        // Drop our copy so the channel can close when sources stop
        drop(tx);

        info!(count = self.sources.len(), "Trigger dispatcher running");

        let mut runs = JoinSet::new();
        let mut summary = DispatchSummary::default();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Trigger dispatcher shutting down");
                    break;
                }
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    self.finish(joined, &mut summary).await;
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event, &mut runs).await,
                        None => {
                            info!("All trigger sources finished, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        for (name, source) in &self.sources {
            info!(source = %name, "Stopping trigger source");
            if let Err(e) = source.stop().await {
                error!(source = %name, error = %e, "Failed to stop trigger source");
            }
        }

        while let Some(joined) = runs.join_next().await {
            self.finish(joined, &mut summary).await;
        }
        Ok(summary)
    }

    async fn finish(
        &self,
        joined: std::result::Result<RunReport, JoinError>,
        summary: &mut DispatchSummary,
    ) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Workflow run task failed");
                return;
            }
        };
        summary.runs += 1;
        if !report.succeeded() {
            summary.failed += 1;
        }
        debug!(run_id = %report.run_id, start_node = %report.start_node, "Run reaped");
        if let Some(ref tx) = self.report_tx {
            if tx.send(report).await.is_err() {
                debug!("Report receiver dropped");
            }
        }
    }

    async fn dispatch(&self, event: TriggerEvent, runs: &mut JoinSet<RunReport>) {
        let workflow = self.executor.workflow().snapshot().await;
        let targets = matching_triggers(&workflow, &event);
        if targets.is_empty() {
            debug!(source = %event.source, "Event matched no trigger");
            return;
        }

        for trigger_node in targets {
            info!(source = %event.source, trigger_node = %trigger_node, "Trigger fired");
            self.event_bus.publish(WorkflowEvent::TriggerFired {
                source: event.source.clone(),
                trigger_node: trigger_node.clone(),
            });
            let executor = self.executor.clone();
            let payload = event.payload.clone();
            runs.spawn(async move { executor.execute_workflow(&trigger_node, payload).await });
        }
    }
}

/// Reads one JSON `TriggerEvent` per line.
///
/// Blank lines are ignored and malformed lines are logged and skipped. The
/// source finishes at end of input.
pub struct LineTriggerSource<R> {
    name: String,
    reader: Mutex<Option<R>>,
    cancel: CancellationToken,
}

impl<R> LineTriggerSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader: Mutex::new(Some(reader)),
            cancel: CancellationToken::new(),
        }
    }
}

/// Parse one input line, stamping the source name when the line has none.
pub fn parse_event_line(source: &str, line: &str) -> Result<Option<TriggerEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut event: TriggerEvent = serde_json::from_str(line)?;
    if event.source.is_empty() {
        event.source = source.to_string();
    }
    Ok(Some(event))
}

impl<R> TriggerSource for LineTriggerSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, tx: mpsc::Sender<TriggerEvent>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let reader = self
                .reader
                .lock()
                .map_err(|e| self.error(e.to_string()))?
                .take()
                .ok_or_else(|| self.error("already started".into()))?;

            let name = self.name.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                let mut lines = reader.lines();
                loop {
                    let line = tokio::select! {
                        _ = cancel.cancelled() => break,
                        line = lines.next_line() => line,
                    };
                    match line {
                        Ok(Some(line)) => match parse_event_line(&name, &line) {
                            Ok(Some(event)) => {
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!(source = %name, error = %e, "Skipping malformed event"),
                        },
                        Ok(None) => {
                            debug!(source = %name, "End of input");
                            break;
                        }
                        Err(e) => {
                            error!(source = %name, error = %e, "Failed to read events");
                            break;
                        }
                    }
                }
            });
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.cancel.cancel();
            Ok(())
        })
    }
}

impl<R> LineTriggerSource<R> {
    fn error(&self, message: String) -> AutomataError {
        AutomataError::Trigger {
            source_name: self.name.clone(),
            message,
        }
    }
}

/// Reads one JSON `TriggerEvent` per line from standard input.
///
/// Lines are read on a dedicated thread. A stdin read cannot be cancelled,
/// so after `stop` the thread may stay parked in `read` until the next line
/// or end of input, but it never holds up runtime shutdown.
pub struct StdinTriggerSource {
    started: AtomicBool,
    cancel: CancellationToken,
}

impl StdinTriggerSource {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for StdinTriggerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerSource for StdinTriggerSource {
    fn name(&self) -> &str {
        "stdin"
    }

    fn start(&self, tx: mpsc::Sender<TriggerEvent>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.started.swap(true, Ordering::SeqCst) {
                return Err(AutomataError::Trigger {
                    source_name: "stdin".into(),
                    message: "already started".into(),
                });
            }
            let cancel = self.cancel.clone();
            std::thread::Builder::new()
                .name("automata-stdin".into())
                .spawn(move || read_event_lines("stdin", std::io::stdin().lock(), tx, cancel))
                .map_err(|e| AutomataError::Trigger {
                    source_name: "stdin".into(),
                    message: e.to_string(),
                })?;
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.cancel.cancel();
            Ok(())
        })
    }
}

/// Blocking line loop behind `StdinTriggerSource`. Must not run on a runtime
/// worker thread.
fn read_event_lines<B: BufRead>(
    name: &str,
    reader: B,
    tx: mpsc::Sender<TriggerEvent>,
    cancel: CancellationToken,
) {
    for line in reader.lines() {
        if cancel.is_cancelled() {
            debug!(source = %name, "Source stopped");
            return;
        }
        match line {
            Ok(line) => match parse_event_line(name, &line) {
                Ok(Some(event)) => {
                    if tx.blocking_send(event).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(source = %name, error = %e, "Skipping malformed event"),
            },
            Err(e) => {
                error!(source = %name, error = %e, "Failed to read events");
                return;
            }
        }
    }
    debug!(source = %name, "End of input");
}
