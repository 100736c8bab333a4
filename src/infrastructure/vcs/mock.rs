//! Scripted VCS driver for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::ports::{VcsDriver, VcsError};

/// In-memory VCS recording branch/commit calls; can be made to fail.
#[derive(Default)]
pub struct MockVcs {
    pub branches: Mutex<Vec<String>>,
    pub commits: Mutex<Vec<String>>,
    fail_commits: bool,
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose commit operation fails (infrastructure error path).
    pub fn failing_commits() -> Self {
        Self {
            fail_commits: true,
            ..Self::default()
        }
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

#[async_trait]
impl VcsDriver for MockVcs {
    async fn is_available(&self) -> bool {
        true
    }

    async fn create_or_switch_branch(&self, name: &str) -> Result<(), VcsError> {
        let mut branches = self.branches.lock().unwrap();
        if !branches.contains(&name.to_string()) {
            branches.push(name.to_string());
        }
        Ok(())
    }

    async fn commit_all(&self, message: &str) -> Result<Option<String>, VcsError> {
        if self.fail_commits {
            return Err(VcsError::CommandFailed("scripted commit failure".to_string()));
        }
        let mut commits = self.commits.lock().unwrap();
        commits.push(message.to_string());
        Ok(Some(format!("commit{:04}", commits.len())))
    }
}
