//! Session store.
//!
//! The sole persistence boundary: one JSON document on disk, loaded at
//! startup and rewritten after every engine transition. Writes go through a
//! temp file and an atomic rename so a crash mid-write never corrupts the
//! document; a crash between transitions is recoverable by reloading and
//! re-evaluating task status.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::models::SessionState;
use crate::domain::{EngineError, EngineResult};

/// File-backed store for the session document.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Conventional location under a project root.
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(".foreman").join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the session document. Missing optional fields default; the
    /// declaration order is repaired to tolerate hand-edits between runs.
    pub async fn load(&self) -> EngineResult<SessionState> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            EngineError::Persistence(format!(
                "cannot read session document {}: {e}",
                self.path.display()
            ))
        })?;
        let mut state: SessionState = serde_json::from_str(&raw)?;
        state.repair_order();
        for task in state.tasks.values() {
            task.validate()
                .map_err(|e| EngineError::Persistence(format!("invalid task {}: {e}", task.id)))?;
        }
        debug!(path = %self.path.display(), tasks = state.tasks.len(), "Session loaded");
        Ok(state)
    }

    /// Durably save the session document (temp file + rename).
    pub async fn save(&self, state: &SessionState) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::Persistence(format!(
                    "cannot create store directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body.as_bytes()).await.map_err(|e| {
            EngineError::Persistence(format!("cannot write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            EngineError::Persistence(format!(
                "cannot replace session document {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Task, TaskStatus};

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        let mut state = SessionState::default();
        let mut task = Task::new("Round trip", "check field-for-field equality");
        task.status = TaskStatus::Done;
        task.commits.push("abc123".to_string());
        state.insert_task(task);

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_tolerates_minimal_hand_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let id = uuid::Uuid::new_v4();
        // A hand-written document with only required task fields.
        let body = format!(
            r#"{{"phase": "execution", "tasks": {{"{id}": {{"id": "{id}", "title": "T", "description": "d"}}}}}}"#
        );
        tokio::fs::write(&path, body).await.unwrap();

        let store = SessionStore::new(path);
        let state = store.load().await.unwrap();
        let task = state.task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert_eq!(state.task_order, vec![id]);
    }

    #[tokio::test]
    async fn test_missing_document_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.is_err());
    }
}
