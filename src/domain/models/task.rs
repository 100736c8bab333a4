//! Task domain model.
//!
//! Tasks are discrete units of planned work executed by the code-generation
//! agent. They form a DAG through their dependency edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in its execution lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but has not started (dependencies may not be met)
    #[default]
    Pending,
    /// Task is currently being executed
    InProgress,
    /// Task completed successfully and was committed
    Done,
    /// Task failed (verification exhausted retries, or an infrastructure error)
    Failed,
    /// Task was explicitly skipped; satisfies dependents
    Skipped,
    /// Task was cancelled; terminal
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "done" | "complete" | "completed" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped | Self::Cancelled)
    }

    /// Whether a dependent task may leave `pending` once a dependency holds
    /// this status.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Cancelled)
    }

    /// Valid transitions from this status.
    ///
    /// `Failed -> Pending` is the explicit user reset that unblocks
    /// dependents after editing a task.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::InProgress, Self::Skipped, Self::Cancelled],
            Self::InProgress => vec![Self::Done, Self::Failed, Self::Cancelled],
            Self::Failed => vec![Self::Pending],
            Self::Done | Self::Skipped | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discrete unit of planned work.
///
/// Tasks are created during planning and mutated only by the execution
/// engine; they are never deleted (cancellation is a terminal status, not
/// removal). Identity is stable across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Detailed description handed to the agent
    pub description: String,
    /// Task IDs this depends on, in declaration order
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
    /// Verification retries consumed so far
    #[serde(default)]
    pub retry_count: u32,
    /// Last recorded error, `infrastructure:`-prefixed for tool errors
    #[serde(default)]
    pub last_error: Option<String>,
    /// Branch assigned when execution started
    #[serde(default)]
    pub branch: Option<String>,
    /// Commit ids produced by this task
    #[serde(default)]
    pub commits: Vec<String>,
    /// When created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When execution started
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal status
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            depends_on: Vec::new(),
            status: TaskStatus::default(),
            retry_count: 0,
            last_error: None,
            branch: None,
            commits: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Add a dependency. Self-edges and duplicates are ignored.
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    /// Deterministic branch name for this task: `task/<slug>-<short id>`.
    pub fn branch_name(&self) -> String {
        let short = &self.id.simple().to_string()[..8];
        format!("task/{}-{}", slugify(&self.title), short)
    }

    /// Check if a transition to the given status is legal.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, updating timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), crate::domain::EngineError> {
        if !self.can_transition_to(new_status) {
            return Err(crate::domain::EngineError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: format!("task {}", self.id),
            });
        }
        self.status = new_status;
        match new_status {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    /// Explicit user reset: `failed -> pending`, clearing the recorded error
    /// and retry count so dependents can run again.
    pub fn reset(&mut self) -> Result<(), crate::domain::EngineError> {
        self.transition_to(TaskStatus::Pending)?;
        self.last_error = None;
        self.retry_count = 0;
        self.completed_at = None;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate structural integrity (used on plan import and store load).
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Task title cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if self.depends_on.contains(&self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        Ok(())
    }
}

/// Lowercase, alphanumeric-and-dash slug of a title, truncated to 32 chars.
fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 32 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "task".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new("Add login", "Implement the login endpoint");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.commits.is_empty());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut task = Task::new("T", "d");
        task.transition_to(TaskStatus::InProgress).unwrap();
        assert!(task.started_at.is_some());
        task.transition_to(TaskStatus::Done).unwrap();
        assert!(task.completed_at.is_some());
        assert!(task.is_terminal());

        // Terminal states admit no further transitions
        assert!(task.transition_to(TaskStatus::Pending).is_err());
    }

    #[test]
    fn test_failed_reset() {
        let mut task = Task::new("T", "d");
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.last_error = Some("tests failed".to_string());
        task.retry_count = 3;
        task.transition_to(TaskStatus::Failed).unwrap();

        task.reset().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.last_error.is_none());
    }

    #[test]
    fn test_pending_cannot_jump_to_done() {
        let mut task = Task::new("T", "d");
        assert!(task.transition_to(TaskStatus::Done).is_err());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_branch_name_deterministic() {
        let task = Task::new("Add OAuth2 login!", "d");
        let name = task.branch_name();
        assert!(name.starts_with("task/add-oauth2-login-"));
        assert_eq!(name, task.branch_name());
    }

    #[test]
    fn test_satisfies_dependents() {
        assert!(TaskStatus::Done.satisfies_dependents());
        assert!(TaskStatus::Skipped.satisfies_dependents());
        assert!(TaskStatus::Cancelled.satisfies_dependents());
        assert!(!TaskStatus::Failed.satisfies_dependents());
        assert!(!TaskStatus::Pending.satisfies_dependents());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let task = Task::new("T", "d");
        let id = task.id;
        let task = task.with_dependency(id);
        assert!(task.depends_on.is_empty());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Add OAuth2 login!"), "add-oauth2-login");
        assert_eq!(slugify("***"), "task");
    }
}
