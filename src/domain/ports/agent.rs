//! Agent invoker port - interface to the external code-generation tool.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// One code-generation request for one task attempt.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub task_id: Uuid,
    /// Task description (with the follow-up failure context on retries)
    pub description: String,
    /// Project context and prior conversation, rendered as text
    pub context: String,
    /// Model identifier passed through to the backend
    pub model: String,
    /// Extra environment for the agent process
    pub env_overrides: BTreeMap<String, String>,
}

/// Completion signal of an invocation.
///
/// `success` is the semantic result reported by the adapter; a zero process
/// exit code alone is not sufficient.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub success: bool,
    /// Final message from the agent (summary or failure explanation)
    pub final_message: String,
}

/// Invocation failures. These are infrastructure errors; they do not
/// consume verification retry budget.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent tool not installed: {0}")]
    NotInstalled(String),

    #[error("agent process failed: {0}")]
    ProcessFailed(String),

    #[error("agent timed out after {0} seconds")]
    Timeout(u64),

    #[error("agent invocation cancelled")]
    Cancelled,
}

/// Capability interface around one external code-generation call per task.
///
/// Variants (CLI subprocess, HTTP API) are interchangeable and chosen at
/// configuration time, keeping backend branching out of the engine.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoker variant name, for logs and preflight reports.
    fn name(&self) -> &'static str;

    /// Whether the underlying tool/endpoint is reachable.
    async fn is_available(&self) -> bool;

    /// Run one invocation. Streamed partial output goes through `chunks`
    /// as it arrives; the returned outcome is the completion signal.
    ///
    /// Implementations must watch `cancel` and terminate the underlying
    /// process gracefully, returning [`AgentError::Cancelled`].
    async fn invoke(
        &self,
        request: AgentRequest,
        chunks: mpsc::Sender<String>,
        cancel: watch::Receiver<bool>,
    ) -> Result<AgentOutcome, AgentError>;
}
