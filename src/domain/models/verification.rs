//! Verification outcome type.

use serde::{Deserialize, Serialize};

/// Result of running the project's test suite for a task.
///
/// `Skipped` is the distinct no-known-test-command outcome: neither pass nor
/// fail, and it does not consume retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed { output: String },
    Failed { output: String },
    Skipped { reason: String },
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed { .. } => "passed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
