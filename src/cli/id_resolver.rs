//! Task id resolution by unique prefix.

use uuid::Uuid;

use crate::domain::models::SessionState;
use crate::domain::{EngineError, EngineResult};

/// Resolve a full uuid or a unique hex prefix to a task id.
pub fn resolve_task_id(state: &SessionState, reference: &str) -> EngineResult<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return if state.tasks.contains_key(&id) {
            Ok(id)
        } else {
            Err(EngineError::TaskNotFound(id))
        };
    }

    let needle = reference.to_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(EngineError::Configuration("empty task reference".to_string()));
    }
    let matches: Vec<Uuid> = state
        .task_order
        .iter()
        .filter(|id| id.simple().to_string().starts_with(&needle))
        .copied()
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(EngineError::Configuration(format!(
            "no task matches '{reference}'"
        ))),
        many => Err(EngineError::Configuration(format!(
            "'{reference}' is ambiguous: matches {} tasks",
            many.len()
        ))),
    }
}
