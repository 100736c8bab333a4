//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::{InvokerKind, Settings};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_retries: {0}. Must be at most 20")]
    InvalidMaxRetries(u32),

    #[error("Invalid agent_timeout_secs: must be positive")]
    InvalidAgentTimeout,

    #[error("Agent command cannot be empty")]
    EmptyAgentCommand,

    #[error("The api invoker requires api_base_url to be set")]
    MissingApiBaseUrl,

    #[error("Model identifier cannot be empty")]
    EmptyModel,
}

/// Loads the settings that seed a new session.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .foreman/config.yaml (project config, created by init)
    /// 3. .foreman/local.yaml (project local overrides, optional)
    /// 4. Environment variables (FOREMAN_* prefix, highest priority)
    pub fn load() -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(".foreman/config.yaml"))
            .merge(Yaml::file(".foreman/local.yaml"))
            .merge(Env::prefixed("FOREMAN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Load settings from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Validate settings after loading.
    pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
        if settings.max_retries > 20 {
            return Err(ConfigError::InvalidMaxRetries(settings.max_retries));
        }
        if settings.agent_timeout_secs == 0 {
            return Err(ConfigError::InvalidAgentTimeout);
        }
        if settings.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        match settings.invoker {
            InvokerKind::Cli => {
                if settings.agent_command.trim().is_empty() {
                    return Err(ConfigError::EmptyAgentCommand);
                }
            }
            InvokerKind::Api => {
                if settings
                    .api_base_url
                    .as_deref()
                    .is_none_or(|url| url.trim().is_empty())
                {
                    return Err(ConfigError::MissingApiBaseUrl);
                }
            }
        }
        Ok(())
    }
}
