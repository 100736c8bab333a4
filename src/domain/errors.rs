//! Engine errors for the Foreman session coordinator.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[Uuid]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by the execution engine and its collaborators.
///
/// Verification failures are not represented here: a failing test run is
/// task data (retry, then `failed` status), not an engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<Uuid>),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Infrastructure error in {component}: {message}")]
    Infrastructure { component: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Shorthand for an infrastructure error tagged with its component.
    pub fn infrastructure(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Infrastructure {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}
