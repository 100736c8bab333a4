//! Version-control driver port.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git is not installed")]
    NotInstalled,

    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("git command failed: {0}")]
    CommandFailed(String),
}

/// Branch and commit primitives over the working tree.
///
/// Both operations are idempotent: switching to the current branch and
/// committing a clean tree are no-ops.
#[async_trait]
pub trait VcsDriver: Send + Sync {
    /// Whether the VCS tool is present and the root is a repository.
    async fn is_available(&self) -> bool;

    /// Create the branch if missing, then switch to it.
    async fn create_or_switch_branch(&self, name: &str) -> Result<(), VcsError>;

    /// Stage everything and commit. Returns the commit id, or `None` when
    /// the tree was already clean.
    async fn commit_all(&self, message: &str) -> Result<Option<String>, VcsError>;
}
