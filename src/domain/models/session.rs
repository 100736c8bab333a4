//! Persistent session state.
//!
//! One structured document, keyed by task id, holding everything a session
//! needs to resume after a process restart: tasks, workflow phase, settings
//! and the planning conversation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::ConversationEntry;
use super::phase::Phase;
use super::settings::Settings;
use super::task::{Task, TaskStatus};

/// The full persisted state of a session.
///
/// `tasks` is keyed by task id; `task_order` records declaration order,
/// which the resolver uses as the deterministic tie-break. Every field
/// defaults so hand-edited documents with missing optional fields load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub tasks: BTreeMap<Uuid, Task>,
    #[serde(default)]
    pub task_order: Vec<Uuid>,
    #[serde(default)]
    pub conversation: Vec<ConversationEntry>,
    /// One-shot project snapshot supplied as planning context.
    #[serde(default)]
    pub project_context: Option<String>,
}

impl SessionState {
    /// Insert a task, recording its declaration order.
    pub fn insert_task(&mut self, task: Task) {
        if !self.task_order.contains(&task.id) {
            self.task_order.push(task.id);
        }
        self.tasks.insert(task.id, task);
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Tasks in declaration order.
    pub fn ordered_tasks(&self) -> Vec<&Task> {
        self.task_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .collect()
    }

    /// Declaration index of a task; unknown ids sort last.
    pub fn declaration_index(&self, id: Uuid) -> usize {
        self.task_order
            .iter()
            .position(|&o| o == id)
            .unwrap_or(usize::MAX)
    }

    /// Repair `task_order` after a hand-edit: drop ids with no task, append
    /// tasks missing from the order (BTreeMap iteration keeps this
    /// deterministic).
    pub fn repair_order(&mut self) {
        self.task_order.retain(|id| self.tasks.contains_key(id));
        let mut seen = std::collections::HashSet::new();
        self.task_order.retain(|id| seen.insert(*id));
        let missing: Vec<Uuid> = self
            .tasks
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        self.task_order.extend(missing);
    }

    /// Whether every dependency of `task` satisfies dependents.
    pub fn dependencies_satisfied(&self, task: &Task) -> bool {
        task.depends_on.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|t| t.status.satisfies_dependents())
        })
    }

    /// Append a conversation entry.
    pub fn record_conversation(&mut self, entry: ConversationEntry) {
        self.conversation.push(entry);
    }

    /// Count tasks by status.
    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }
}
