//! Command-line interface.

pub mod commands;
pub mod id_resolver;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Foreman: resumable coordinator for agent-driven development sessions.
#[derive(Debug, Parser)]
#[command(name = "foreman", version, about)]
pub struct Cli {
    /// Project root containing the working tree and .foreman directory
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Emit machine-readable JSON where supported
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a session seeded from the config file
    Init(commands::init::InitArgs),
    /// Import or inspect the task plan
    Plan(commands::plan::PlanArgs),
    /// Advance the workflow phase, or return to planning
    Phase(commands::phase::PhaseArgs),
    /// Run the execution phase to completion
    Run(commands::run::RunArgs),
    /// Show session status
    Status(commands::status::StatusArgs),
    /// Administer individual tasks between runs
    Task(commands::task::TaskArgs),
}

/// Print an error and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json: bool) {
    if json {
        let body = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{body}");
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
