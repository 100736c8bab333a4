//! `foreman task` - administer individual tasks between runs.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::id_resolver::resolve_task_id;
use crate::domain::models::TaskStatus;
use crate::domain::EngineError;
use crate::store::SessionStore;

#[derive(Debug, Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// Reset a failed task to pending, unblocking its dependents
    Reset { id: String },
    /// Skip a pending task; dependents treat it as satisfied
    Skip { id: String },
    /// Cancel a task that has not finished
    Cancel { id: String },
}

pub async fn execute(root: &Path, args: TaskArgs, json: bool) -> Result<()> {
    let store = SessionStore::new(SessionStore::default_path(root));
    let mut state = store.load().await?;

    let (reference, target) = match &args.action {
        TaskAction::Reset { id } => (id, TaskStatus::Pending),
        TaskAction::Skip { id } => (id, TaskStatus::Skipped),
        TaskAction::Cancel { id } => (id, TaskStatus::Cancelled),
    };
    let task_id = resolve_task_id(&state, reference)?;
    let task = state
        .task_mut(task_id)
        .ok_or(EngineError::TaskNotFound(task_id))?;

    match target {
        TaskStatus::Pending => task.reset()?,
        status => task.transition_to(status)?,
    }
    let new_status = task.status;

    store.save(&state).await?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "task": task_id, "status": new_status.as_str() })
        );
    } else {
        println!("Task {task_id} is now {new_status}");
    }
    Ok(())
}
