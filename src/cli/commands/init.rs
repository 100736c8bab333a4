//! `foreman init` - create a session seeded from the config file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::domain::models::{ConversationEntry, ConversationRole, SessionState};
use crate::infrastructure::ConfigLoader;
use crate::store::SessionStore;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Replace an existing session
    #[arg(long)]
    pub force: bool,

    /// File whose contents become the project context snapshot
    #[arg(long)]
    pub context: Option<std::path::PathBuf>,
}

pub async fn execute(root: &Path, args: InitArgs, json: bool) -> Result<()> {
    let store = SessionStore::new(SessionStore::default_path(root));
    if store.exists() && !args.force {
        bail!(
            "session already exists at {}; use --force to replace it",
            store.path().display()
        );
    }

    // Write a starter config the first time so settings are discoverable
    let config_path = root.join(".foreman").join("config.yaml");
    if !config_path.exists() {
        tokio::fs::create_dir_all(root.join(".foreman")).await?;
        let body = serde_yaml::to_string(&crate::domain::models::Settings::default())?;
        tokio::fs::write(&config_path, body).await?;
    }

    let settings = ConfigLoader::load_from_file(&config_path)?;

    let mut state = SessionState {
        settings,
        ..SessionState::default()
    };
    if let Some(path) = args.context {
        let snapshot = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read context file {}", path.display()))?;
        state.project_context = Some(snapshot);
    }
    state.record_conversation(ConversationEntry::new(
        ConversationRole::System,
        "session initialized",
    ));

    store.save(&state).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "session": store.path(), "phase": state.phase.as_str() })
        );
    } else {
        println!("Initialized session at {}", store.path().display());
        println!("Phase: {}", state.phase);
    }
    Ok(())
}
