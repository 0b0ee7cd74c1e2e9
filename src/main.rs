use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use automata_core::config::AppConfig;
use automata_core::event::EventBus;
use automata_core::payload::Payload;
use automata_core::types::WorkflowEvent;

use automata_engine::{
    ActionInvoker, RunReport, SharedWorkflow, StdinTriggerSource, TriggerDispatcher, Workflow,
    WorkflowExecutor,
};

#[derive(Parser)]
#[command(name = "automata", version, about = "Event-driven workflow engine for on-chain automations")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "automata.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow once from a start node
    Run {
        /// Workflow definition (JSON with nodes and edges)
        #[arg(short, long)]
        workflow: PathBuf,
        /// Node to start from
        #[arg(short, long)]
        start: String,
        /// Initial payload as a JSON object
        #[arg(short, long)]
        payload: Option<String>,
    },
    /// Run a workflow for every trigger event read from stdin (one JSON object per line)
    Listen {
        /// Workflow definition (JSON with nodes and edges)
        #[arg(short, long)]
        workflow: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "automata", &mut std::io::stdout());
        return Ok(());
    }

    let config_found = cli.config.exists();
    let config = if config_found {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };

    // RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if config_found {
        info!(path = %cli.config.display(), "Loaded config");
    } else {
        warn!(path = %cli.config.display(), "No config file found, using defaults");
    }

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run {
            workflow,
            start,
            payload,
        } => {
            let workflow = load_workflow(&workflow)?;
            let payload = parse_payload(payload.as_deref())?;

            let event_bus = Arc::new(EventBus::new(config.engine.event_capacity));
            let printer = spawn_event_printer(&event_bus);
            let executor = build_executor(&config, workflow, event_bus.clone())?;

            executor.tracker().reset_all().await;
            let report = executor.execute_workflow(&start, payload).await;

            // Close the bus so the printer drains and exits
            drop(executor);
            drop(event_bus);
            printer.await.ok();

            print_report(&report);
            if !report.succeeded() {
                anyhow::bail!("{} node(s) failed", report.failed());
            }
        }
        Commands::Listen { workflow } => {
            let workflow = load_workflow(&workflow)?;
            if !workflow.is_active() {
                warn!("Workflow has no armed triggers; only events naming a trigger node will run");
            }

            let event_bus = Arc::new(EventBus::new(config.engine.event_capacity));
            let printer = spawn_event_printer(&event_bus);
            let executor = build_executor(&config, workflow, event_bus.clone())?;

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down listener...");
                cancel_clone.cancel();
            });

            // Print each report as its run completes
            let (report_tx, mut report_rx) = tokio::sync::mpsc::channel::<RunReport>(16);
            let reporter = tokio::spawn(async move {
                while let Some(report) = report_rx.recv().await {
                    print_report(&report);
                }
            });

            let mut dispatcher = TriggerDispatcher::new(executor, cancel);
            dispatcher.set_report_sink(report_tx);
            dispatcher.add_source(Arc::new(StdinTriggerSource::new()));
            let summary = dispatcher.run().await?;

            drop(event_bus);
            printer.await.ok();
            reporter.await.ok();

            info!(runs = summary.runs, failed = summary.failed, "Listener finished");
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn load_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow {}", path.display()))?;
    let workflow = Workflow::from_json(&text)
        .with_context(|| format!("invalid workflow {}", path.display()))?;
    info!(
        path = %path.display(),
        nodes = workflow.nodes().len(),
        edges = workflow.edges().len(),
        "Loaded workflow"
    );
    Ok(workflow)
}

fn parse_payload(raw: Option<&str>) -> anyhow::Result<Payload> {
    let Some(raw) = raw else {
        return Ok(Payload::new());
    };
    let value: serde_json::Value = serde_json::from_str(raw).context("payload is not valid JSON")?;
    Ok(Payload::from_value(value)?)
}

fn build_executor(
    config: &AppConfig,
    workflow: Workflow,
    event_bus: Arc<EventBus>,
) -> anyhow::Result<WorkflowExecutor> {
    let (classifier, relay) = automata_relay::create_collaborators(config)?;
    Ok(WorkflowExecutor::new(
        SharedWorkflow::new(workflow),
        ActionInvoker::new(classifier, relay),
        event_bus,
        &config.engine,
    ))
}

/// Print workflow events to stderr until the bus closes.
fn spawn_event_printer(event_bus: &EventBus) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(n)) => {
                    eprintln!("[events: {} dropped]", n);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event {
                WorkflowEvent::RunStarted { run_id, start_node } => {
                    eprintln!("[run {}] started at {}", short(&run_id.0), start_node);
                }
                WorkflowEvent::NodeStatusChanged { node_id, status } => {
                    eprintln!("[{}] {}", node_id, status);
                }
                WorkflowEvent::NodeFailed { node_id, error, .. } => {
                    eprintln!("[{}: ERROR] {}", node_id, error);
                }
                WorkflowEvent::BranchUnmatched { node_id, result, .. } => {
                    eprintln!("[{}] no '{}' branch, stopping here", node_id, result);
                }
                WorkflowEvent::TransactionSubmitted { node_id, tx_hash, .. } => {
                    eprintln!("[{}] tx {}", node_id, tx_hash.as_deref().unwrap_or("(no hash)"));
                }
                WorkflowEvent::NodeSkipped { node_id, reason, .. } => {
                    eprintln!("[{}] skipped: {}", node_id, reason);
                }
                WorkflowEvent::RunComplete {
                    run_id,
                    executed,
                    failed,
                } => {
                    eprintln!(
                        "[run {}] complete: {} executed, {} failed",
                        short(&run_id.0),
                        executed,
                        failed
                    );
                }
                WorkflowEvent::TriggerFired {
                    source,
                    trigger_node,
                } => {
                    eprintln!("[trigger: {}] fired by {}", trigger_node, source);
                }
            }
        }
    })
}

fn print_report(report: &RunReport) {
    println!(
        "Run {} from '{}' at {} ({}ms)",
        report.run_id,
        report.start_node,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.total_elapsed_ms
    );
    for record in &report.records {
        let detail = record
            .error
            .as_deref()
            .or(record.tx_hash.as_deref())
            .or(record.branch.as_deref())
            .unwrap_or("");
        println!(
            "  {:<20} {:<9} {:<8} {:>6}ms  {}",
            record.node_id,
            record.kind.as_str(),
            record.status.to_string(),
            record.elapsed_ms,
            detail
        );
    }
    for node_id in &report.skipped {
        println!("  {:<20} skipped", node_id);
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
