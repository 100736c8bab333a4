//! Dependency resolution over the session's task graph.
//!
//! Produces a deterministic execution order in which every task appears
//! only after all of its dependencies, and reports cycles as fatal
//! configuration errors with the offending tasks enumerated.

use std::collections::{BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use crate::domain::models::{SessionState, Task, TaskStatus};
use crate::domain::{EngineError, EngineResult};

/// Outcome of resolving the task graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Schedulable tasks in a dependency-respecting order; independent
    /// tasks keep their declaration order.
    pub runnable: Vec<Uuid>,
    /// Schedulable tasks unrunnable because a dependency (transitively)
    /// failed; they stay pending until the failure is reset.
    pub blocked: Vec<Uuid>,
}

/// Whether a task still needs scheduling. `in_progress` covers resumption
/// after a crash mid-task.
fn schedulable(task: &Task) -> bool {
    matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
}

// Standalone DFS helper for cycle detection (no self needed)
fn detect_cycle_util(
    node: Uuid,
    graph: &HashMap<Uuid, Vec<Uuid>>,
    visited: &mut HashSet<Uuid>,
    visiting: &mut HashSet<Uuid>,
    path: &mut Vec<Uuid>,
) -> bool {
    visited.insert(node);
    visiting.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(&node) {
        for &neighbor in neighbors {
            if !visited.contains(&neighbor) {
                if detect_cycle_util(neighbor, graph, visited, visiting, path) {
                    return true;
                }
            } else if visiting.contains(&neighbor) {
                // Cycle found; trim the path down to the cycle itself
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    visiting.remove(&node);
    path.pop();
    false
}

/// Service computing a dependency-respecting execution order.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Every dependency id must reference an existing task.
    pub fn validate_dependencies(&self, state: &SessionState) -> EngineResult<()> {
        for task in state.tasks.values() {
            for dep in &task.depends_on {
                if !state.tasks.contains_key(dep) {
                    return Err(EngineError::Configuration(format!(
                        "task {} depends on unknown task {}",
                        task.id, dep
                    )));
                }
            }
        }
        Ok(())
    }

    /// DFS cycle detection with a "visiting" marker. Returns the enumerated
    /// cyclic tasks, or `None` for an acyclic graph.
    pub fn detect_cycle(&self, state: &SessionState) -> Option<Vec<Uuid>> {
        let mut graph: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for task in state.ordered_tasks() {
            graph
                .entry(task.id)
                .or_default()
                .extend(task.depends_on.iter().copied());
        }

        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        let mut path = Vec::new();

        // Declaration order keeps the reported cycle deterministic
        for task in state.ordered_tasks() {
            if !visited.contains(&task.id)
                && detect_cycle_util(task.id, &graph, &mut visited, &mut visiting, &mut path)
            {
                return Some(path);
            }
        }
        None
    }

    /// Resolve the pending execution sequence.
    ///
    /// Tasks already `done`/`skipped`/`cancelled` are excluded but satisfy
    /// dependents; `failed` tasks block their dependents (transitively)
    /// until reset to pending.
    pub fn resolve(&self, state: &SessionState) -> EngineResult<Resolution> {
        self.validate_dependencies(state)?;
        if let Some(cycle) = self.detect_cycle(state) {
            return Err(EngineError::DependencyCycle(cycle));
        }

        // Partition schedulable tasks into blocked and runnable
        let mut block_memo: HashMap<Uuid, bool> = HashMap::new();
        let mut blocked = Vec::new();
        let mut runnable_set = HashSet::new();
        for task in state.ordered_tasks() {
            if !schedulable(task) {
                continue;
            }
            if is_blocked(task.id, state, &mut block_memo) {
                blocked.push(task.id);
            } else {
                runnable_set.insert(task.id);
            }
        }

        // Kahn's algorithm over the runnable subgraph; the ready set is
        // keyed by declaration index so independent tasks break ties by
        // declaration order.
        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for &id in &runnable_set {
            let task = &state.tasks[&id];
            let degree = task
                .depends_on
                .iter()
                .filter(|dep| runnable_set.contains(dep))
                .count();
            in_degree.insert(id, degree);
            for dep in &task.depends_on {
                if runnable_set.contains(dep) {
                    dependents.entry(*dep).or_default().push(id);
                }
            }
        }

        let mut ready: BTreeSet<(usize, Uuid)> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| (state.declaration_index(id), id))
            .collect();

        let mut runnable = Vec::with_capacity(runnable_set.len());
        while let Some(&(index, id)) = ready.iter().next() {
            ready.remove(&(index, id));
            runnable.push(id);
            if let Some(deps) = dependents.get(&id) {
                for &dependent in deps {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert((state.declaration_index(dependent), dependent));
                        }
                    }
                }
            }
        }

        // The cycle check already ran, so the sort must drain completely
        debug_assert_eq!(runnable.len(), runnable_set.len());

        Ok(Resolution { runnable, blocked })
    }
}

/// A schedulable task is blocked when any dependency failed, or depends on
/// a blocked schedulable task. Acyclicity is established by the caller.
fn is_blocked(id: Uuid, state: &SessionState, memo: &mut HashMap<Uuid, bool>) -> bool {
    if let Some(&cached) = memo.get(&id) {
        return cached;
    }
    let task = &state.tasks[&id];
    let mut blocked = false;
    for dep in &task.depends_on {
        let Some(dep_task) = state.tasks.get(dep) else {
            continue;
        };
        if dep_task.status == TaskStatus::Failed
            || (schedulable(dep_task) && is_blocked(*dep, state, memo))
        {
            blocked = true;
            break;
        }
    }
    memo.insert(id, blocked);
    blocked
}
