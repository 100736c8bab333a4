//! `foreman run` - drive the execution phase to completion.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;
use tokio::sync::mpsc;

use crate::domain::models::{ExecutionEvent, RunSummary, TaskStatus, TestOutcome};
use crate::domain::ports::VcsDriver;
use crate::infrastructure::agent::invoker_from_settings;
use crate::infrastructure::vcs::GitDriver;
use crate::infrastructure::verify::TestCommandRunner;
use crate::infrastructure::{preflight, ConfigLoader};
use crate::services::{ExecutionEngine, TaskExecutor};
use crate::store::SessionStore;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Suppress streamed agent output (events still print)
    #[arg(long)]
    pub quiet: bool,
}

pub async fn execute(root: &Path, args: RunArgs, json: bool) -> Result<()> {
    let store = SessionStore::new(SessionStore::default_path(root));
    let state = store.load().await?;
    let settings = state.settings.clone();
    ConfigLoader::validate(&settings)?;

    let invoker = invoker_from_settings(&settings, root);
    let vcs: Arc<dyn VcsDriver> = Arc::new(GitDriver::new(root));

    // Startup dependency gate runs once, before any task starts
    preflight::gate(&vcs, &invoker).await?;

    let verifier = Arc::new(TestCommandRunner::new(settings.test_command.clone()));
    let executor = TaskExecutor::new(invoker, verifier, vcs, root);
    let engine = ExecutionEngine::new(store, executor);

    // Ctrl-C requests cancellation at the next safe checkpoint
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", style("cancellation requested...").yellow());
            cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel::<ExecutionEvent>(256);
    let quiet = args.quiet;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, quiet);
        }
    });

    let summary = engine.run_with_events(tx).await?;
    let _ = printer.await;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "total_tasks": summary.total_tasks,
                "done": summary.done,
                "failed": summary.failed,
                "skipped": summary.skipped,
                "cancelled": summary.cancelled,
                "blocked": summary.blocked,
                "stalled": summary.stalled,
                "duration_secs": summary.duration_secs,
            })
        );
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_event(event: &ExecutionEvent, quiet: bool) {
    match event {
        ExecutionEvent::RunStarted { total_tasks } => {
            println!("{} {total_tasks} task(s) to run", style("▶").bold());
        }
        ExecutionEvent::TaskStarted { title, .. } => {
            println!("{} {}", style("▶").cyan().bold(), style(title).bold());
        }
        ExecutionEvent::AgentOutputChunk { text, .. } => {
            if !quiet {
                println!("  {}", style(text).dim());
                let _ = std::io::stdout().flush();
            }
        }
        ExecutionEvent::TaskTestResult { outcome, .. } => {
            let label = match outcome {
                TestOutcome::Passed { .. } => style("tests passed").green(),
                TestOutcome::Failed { .. } => style("tests failed").red(),
                TestOutcome::Skipped { .. } => style("verification skipped").yellow(),
            };
            println!("  {label}");
        }
        ExecutionEvent::TaskRetrying { attempt, max_attempts, .. } => {
            println!(
                "  {} retry {attempt}/{max_attempts}",
                style("↻").yellow().bold()
            );
        }
        ExecutionEvent::TaskCompleted { status, .. } => {
            let label = match status {
                TaskStatus::Done => style("done").green().bold(),
                TaskStatus::Failed => style("failed").red().bold(),
                TaskStatus::Cancelled => style("cancelled").yellow().bold(),
                other => style(other.as_str()).dim(),
            };
            println!("  {} {label}", style("■").bold());
        }
        ExecutionEvent::RunCompleted { .. } => {}
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    let headline = if summary.stalled {
        style("Plan stalled").red().bold()
    } else if summary.is_clean() {
        style("Run complete").green().bold()
    } else {
        style("Run finished with issues").yellow().bold()
    };
    println!(
        "{headline}: {} done, {} failed, {} skipped, {} cancelled, {} blocked ({}s)",
        summary.done,
        summary.failed,
        summary.skipped,
        summary.cancelled,
        summary.blocked,
        summary.duration_secs
    );
}
