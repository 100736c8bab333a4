//! Session workflow phase.

use serde::{Deserialize, Serialize};

use crate::domain::EngineError;

/// Coarse workflow stage of a session.
///
/// Transitions are strictly forward (`advance`); the one exception is the
/// explicit `replan` action returning to Planning while completed-task
/// history is preserved in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Planning,
    Review,
    Inputs,
    Execution,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Review => "review",
            Self::Inputs => "inputs",
            Self::Execution => "execution",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "planning" => Some(Self::Planning),
            "review" => Some(Self::Review),
            "inputs" => Some(Self::Inputs),
            "execution" => Some(Self::Execution),
            _ => None,
        }
    }

    /// The next phase in the forward direction, if any.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::Planning => Some(Self::Review),
            Self::Review => Some(Self::Inputs),
            Self::Inputs => Some(Self::Execution),
            Self::Execution => None,
        }
    }

    /// Move one step forward.
    pub fn advance(&mut self) -> Result<(), EngineError> {
        match self.next() {
            Some(next) => {
                *self = next;
                Ok(())
            }
            None => Err(EngineError::Configuration(
                "Execution is the final phase; use replan to return to planning".to_string(),
            )),
        }
    }

    /// Explicit replanning action: return to Planning from any later phase.
    pub fn replan(&mut self) {
        *self = Self::Planning;
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
