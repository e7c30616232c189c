// ==========================================
// Scrap Recycling - Command Line Entry
// ==========================================
// Subcommands: status, watch, config
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use scrap_recycling::app::{get_default_db_path, AppState};
use scrap_recycling::config::PollerConfig;
use scrap_recycling::logging::{self, LogFormat};
use scrap_recycling::poller::{HttpWorkflowSource, WorkflowPoller, WorkflowSource, WorkflowView};
use scrap_recycling::WorkflowSnapshot;

#[derive(Parser, Debug)]
#[command(name = "scrap-recycling")]
#[command(version, about = scrap_recycling::APP_NAME, long_about = None)]
struct Cli {
    /// Database file (defaults to SCRAP_RECYCLING_DB_PATH or the user data dir)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Print the current workflow snapshot
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the workflow view until interrupted
    Watch {
        /// Console backend base URL; the local database is used when absent
        #[arg(long)]
        remote: Option<String>,
    },
    /// Show the configuration, or set KEY to VALUE
    Config {
        #[arg(requires = "value")]
        key: Option<String>,
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_with_format(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!(version = scrap_recycling::VERSION, db_path = %db_path, "starting");
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Status { json } => cmd_status(&state, json),
        Commands::Watch { remote } => cmd_watch(&state, remote).await,
        Commands::Config { key, value } => cmd_config(&state, key.zip(value)),
    }
}

// ==========================================
// Commands
// ==========================================

fn cmd_status(state: &AppState, json: bool) -> Result<()> {
    let snapshot = state
        .recycling_api
        .get_workflow_snapshot()
        .map_err(|e| anyhow!("[{}] {}", e.code(), e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

async fn cmd_watch(state: &AppState, remote: Option<String>) -> Result<()> {
    let config = PollerConfig::load(state.config_manager.as_ref())
        .await
        .map_err(|e| anyhow!("cannot load poller config: {}", e))?;

    let poller = match remote {
        Some(url) => {
            let source: Arc<dyn WorkflowSource> = Arc::new(
                HttpWorkflowSource::new(&url).map_err(|e| anyhow!("[{}] {}", e.code(), e))?,
            );
            tracing::info!(base_url = %url, "watching remote console backend");
            WorkflowPoller::new(source, config)
        }
        None => WorkflowPoller::new(state.local_source(), config)
            .with_event_stream(state.subscribe_events()),
    };

    let handle = poller.start();
    let mut views = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print_view(&view);
            }
        }
    }

    handle.stop().await;
    Ok(())
}

fn cmd_config(state: &AppState, assignment: Option<(String, String)>) -> Result<()> {
    match assignment {
        None => {
            println!("{}", state.config_manager.get_config_snapshot().map_err(|e| anyhow!(e))?);
        }
        Some((key, value)) => {
            state
                .config_manager
                .set_config_value(&key, &value)
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("cannot set {}", key))?;
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

// ==========================================
// Output
// ==========================================

fn print_snapshot(snapshot: &WorkflowSnapshot) {
    println!(
        "uncollected scrap: hard={:.3} soft={:.3}",
        snapshot.totals.hard_total, snapshot.totals.soft_total
    );

    match &snapshot.active_batch {
        None => println!("active batch: none"),
        Some(batch) => {
            println!(
                "active batch: {} started by {} at {} (hard={:.3} soft={:.3})",
                batch.label(),
                batch.started_by,
                batch.started_at.to_rfc3339(),
                batch.total_hard_scrap,
                batch.total_soft_scrap
            );
            for p in &snapshot.processes {
                let state = match (p.completed_at, p.output_quantity) {
                    (Some(at), Some(out)) => format!("completed {} output={:.3}", at.to_rfc3339(), out),
                    (Some(at), None) => format!("completed {}", at.to_rfc3339()),
                    _ => "running".to_string(),
                };
                println!(
                    "  {:<9} {} input={:.3} wc={} lead={} {}",
                    p.drobilka_type.line_name(),
                    p.process_id,
                    p.input_quantity,
                    p.work_center,
                    p.lead_operator,
                    state
                );
            }
        }
    }

    if snapshot.can_complete {
        println!("batch can be completed");
    } else {
        for blocker in &snapshot.completion_blockers {
            println!("cannot complete: {}", blocker);
        }
    }
}

fn print_view(view: &WorkflowView) {
    if let Some(err) = &view.last_error {
        println!(
            "[stale] refresh failed {} time(s): {}",
            view.consecutive_errors, err
        );
    }
    match &view.snapshot {
        Some(snapshot) => print_snapshot(snapshot),
        None => println!("waiting for first refresh"),
    }
    println!("---");
}
