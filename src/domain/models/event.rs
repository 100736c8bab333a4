//! Execution event stream model.
//!
//! Events are ephemeral notifications of engine progress; they are never
//! persisted. The engine guarantees that the store reflects a transition
//! before the matching event reaches a subscriber.

use uuid::Uuid;

use super::task::TaskStatus;
use super::verification::TestOutcome;

/// Event emitted during a run.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// The run started over the resolved pending sequence.
    RunStarted { total_tasks: usize },
    /// A task entered execution.
    TaskStarted { task_id: Uuid, title: String },
    /// Streamed partial agent output; carries no state transition.
    AgentOutputChunk { task_id: Uuid, text: String },
    /// Verification finished for one generation attempt.
    TaskTestResult { task_id: Uuid, outcome: TestOutcome },
    /// Verification failed and budget remains; generation re-enters.
    TaskRetrying {
        task_id: Uuid,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    /// A task reached a terminal status.
    TaskCompleted { task_id: Uuid, status: TaskStatus },
    /// The run finished (normally, stalled, or cancelled).
    RunCompleted { summary: RunSummary },
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    /// Pending tasks left unrunnable by failed dependencies.
    pub blocked: usize,
    /// True when a failure left every remaining task blocked.
    pub stalled: bool,
    pub duration_secs: u64,
}

impl RunSummary {
    /// Whether every scheduled task reached `done` or `skipped`.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.blocked == 0 && !self.stalled
    }
}
