//! Execution settings.
//!
//! Settings persist in the session document, seed from the config file at
//! `init`, and are read-only for the duration of a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which agent invoker variant to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokerKind {
    /// Shell out to a local agent CLI
    #[default]
    Cli,
    /// Call a remote generation endpoint over HTTP
    Api,
}

impl InvokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Api => "api",
        }
    }
}

/// Execution configuration for a session.
///
/// Every field carries a serde default so a hand-edited session document
/// with missing fields still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Model identifier passed through to the agent
    #[serde(default = "default_model")]
    pub model: String,

    /// Invoker variant selected at configuration time
    #[serde(default)]
    pub invoker: InvokerKind,

    /// Agent CLI command (cli invoker)
    #[serde(default = "default_agent_command")]
    pub agent_command: String,

    /// Base URL of the generation endpoint (api invoker)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Verification retry budget per task
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout for a single agent invocation, in seconds
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,

    /// Override for the detected test command (run through `sh -c`)
    #[serde(default)]
    pub test_command: Option<String>,

    /// Extra environment variables for the agent process
    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,
}

fn default_model() -> String {
    "default".to_string()
}

fn default_agent_command() -> String {
    "agent".to_string()
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_agent_timeout_secs() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            invoker: InvokerKind::default(),
            agent_command: default_agent_command(),
            api_base_url: None,
            max_retries: default_max_retries(),
            agent_timeout_secs: default_agent_timeout_secs(),
            test_command: None,
            env_overrides: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_document_loads() {
        let settings: Settings =
            serde_json::from_str(r#"{"model": "sonnet", "max_retries": 1}"#).unwrap();
        assert_eq!(settings.model, "sonnet");
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.invoker, InvokerKind::Cli);
        assert_eq!(settings.agent_timeout_secs, 600);
    }
}
