//! `foreman phase` - advance the workflow, or return to planning.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::domain::models::{ConversationEntry, ConversationRole};
use crate::store::SessionStore;

#[derive(Debug, Args)]
pub struct PhaseArgs {
    #[command(subcommand)]
    pub action: PhaseAction,
}

#[derive(Debug, Subcommand)]
pub enum PhaseAction {
    /// Move one step forward (planning -> review -> inputs -> execution)
    Advance,
    /// Return to planning; completed task history is preserved
    Replan,
}

pub async fn execute(root: &Path, args: PhaseArgs, json: bool) -> Result<()> {
    let store = SessionStore::new(SessionStore::default_path(root));
    let mut state = store.load().await?;
    let from = state.phase;

    match args.action {
        PhaseAction::Advance => state.phase.advance()?,
        PhaseAction::Replan => {
            state.phase.replan();
            state.record_conversation(ConversationEntry::new(
                ConversationRole::System,
                format!("replanning requested from the {from} phase"),
            ));
        }
    }

    store.save(&state).await?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "from": from.as_str(), "to": state.phase.as_str() })
        );
    } else {
        println!("Phase: {from} -> {}", state.phase);
    }
    Ok(())
}
