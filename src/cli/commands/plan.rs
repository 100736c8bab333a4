//! `foreman plan` - import and inspect the task plan.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Deserialize;

use crate::domain::models::{ConversationEntry, ConversationRole, Phase, Task};
use crate::services::DependencyResolver;
use crate::store::SessionStore;

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(subcommand)]
    pub action: PlanAction,
}

#[derive(Debug, Subcommand)]
pub enum PlanAction {
    /// Import tasks from a YAML or JSON plan file
    Import {
        /// Plan file path
        file: PathBuf,
    },
    /// List planned tasks in declaration order
    Show,
}

/// One task in a plan file; dependencies reference earlier entries by index.
#[derive(Debug, Deserialize)]
struct PlanFileTask {
    title: String,
    description: String,
    #[serde(default)]
    depends_on: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    context: Option<String>,
    tasks: Vec<PlanFileTask>,
}

pub async fn execute(root: &Path, args: PlanArgs, json: bool) -> Result<()> {
    let store = SessionStore::new(SessionStore::default_path(root));
    match args.action {
        PlanAction::Import { file } => import(&store, &file, json).await,
        PlanAction::Show => show(&store, json).await,
    }
}

async fn import(store: &SessionStore, file: &Path, json: bool) -> Result<()> {
    let mut state = store.load().await?;
    if state.phase != Phase::Planning {
        bail!(
            "plan import is only allowed in the planning phase (current: {}); \
             use `foreman phase replan` to return to planning",
            state.phase
        );
    }

    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("cannot read plan file {}", file.display()))?;
    let plan: PlanFile = if file.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&raw).context("invalid JSON plan")?
    } else {
        serde_yaml::from_str(&raw).context("invalid YAML plan")?
    };

    if let Some(context) = plan.context {
        state.project_context = Some(context);
    }

    // First pass creates ids, second pass wires index-based dependencies
    let mut tasks: Vec<Task> = plan
        .tasks
        .iter()
        .map(|t| Task::new(&t.title, &t.description))
        .collect();
    for (index, entry) in plan.tasks.iter().enumerate() {
        for &dep in &entry.depends_on {
            let Some(dep_task) = tasks.get(dep) else {
                bail!("task {index} depends on out-of-range index {dep}");
            };
            let dep_id = dep_task.id;
            tasks[index] = tasks[index].clone().with_dependency(dep_id);
        }
    }

    let count = tasks.len();
    for task in tasks {
        task.validate().map_err(|e| anyhow::anyhow!(e))?;
        state.insert_task(task);
    }

    // Reject cycles and unknown references before anything persists
    DependencyResolver::new().resolve(&state)?;

    state.record_conversation(ConversationEntry::new(
        ConversationRole::System,
        format!("imported plan with {count} tasks from {}", file.display()),
    ));
    store.save(&state).await?;

    if json {
        println!("{}", serde_json::json!({ "imported": count }));
    } else {
        println!("Imported {count} tasks from {}", file.display());
    }
    Ok(())
}

async fn show(store: &SessionStore, json: bool) -> Result<()> {
    let state = store.load().await?;
    if json {
        let tasks: Vec<_> = state
            .ordered_tasks()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "status": t.status.as_str(),
                    "depends_on": t.depends_on,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    for task in state.ordered_tasks() {
        let short = &task.id.simple().to_string()[..8];
        println!("{short}  [{}]  {}", task.status, task.title);
    }
    Ok(())
}
