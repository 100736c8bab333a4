//! `foreman status` - session overview table.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};

use crate::domain::models::TaskStatus;
use crate::store::SessionStore;

#[derive(Debug, Args)]
pub struct StatusArgs {}

pub async fn execute(root: &Path, _args: StatusArgs, json: bool) -> Result<()> {
    let store = SessionStore::new(SessionStore::default_path(root));
    let state = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("Phase: {}", console::style(state.phase).bold());
    println!(
        "Tasks: {} done, {} failed, {} skipped, {} cancelled, {} pending\n",
        state.count_status(TaskStatus::Done),
        state.count_status(TaskStatus::Failed),
        state.count_status(TaskStatus::Skipped),
        state.count_status(TaskStatus::Cancelled),
        state.count_status(TaskStatus::Pending) + state.count_status(TaskStatus::InProgress),
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["ID", "Title", "Status", "Retries", "Branch", "Last error"]);
    for task in state.ordered_tasks() {
        let short = task.id.simple().to_string()[..8].to_string();
        let status = match task.status {
            TaskStatus::Done => console::style(task.status.as_str()).green(),
            TaskStatus::Failed => console::style(task.status.as_str()).red(),
            TaskStatus::InProgress => console::style(task.status.as_str()).cyan(),
            TaskStatus::Skipped | TaskStatus::Cancelled => {
                console::style(task.status.as_str()).yellow()
            }
            TaskStatus::Pending => console::style(task.status.as_str()).dim(),
        };
        table.add_row(vec![
            Cell::new(short),
            Cell::new(&task.title),
            Cell::new(status),
            Cell::new(task.retry_count),
            Cell::new(task.branch.as_deref().unwrap_or("-")),
            Cell::new(truncate(task.last_error.as_deref().unwrap_or("-"), 60)),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}
