//! Agent invoker implementations.

pub mod api;
pub mod cli;
pub mod mock;

pub use api::{ApiAgentInvoker, ApiInvokerConfig};
pub use cli::{CliAgentInvoker, CliInvokerConfig};
pub use mock::{MockAgentInvoker, MockBehavior};

use std::path::Path;
use std::sync::Arc;

use crate::domain::models::{InvokerKind, Settings};
use crate::domain::ports::AgentInvoker;

/// Build the invoker variant selected in settings.
pub fn invoker_from_settings(settings: &Settings, repo_root: &Path) -> Arc<dyn AgentInvoker> {
    match settings.invoker {
        InvokerKind::Cli => Arc::new(CliAgentInvoker::new(CliInvokerConfig {
            command: settings.agent_command.clone(),
            working_dir: Some(repo_root.to_path_buf()),
            timeout_secs: settings.agent_timeout_secs,
        })),
        InvokerKind::Api => Arc::new(ApiAgentInvoker::new(ApiInvokerConfig {
            base_url: settings.api_base_url.clone().unwrap_or_default(),
            timeout_secs: settings.agent_timeout_secs,
        })),
    }
}
