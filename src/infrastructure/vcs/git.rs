//! Git driver.
//!
//! Branch and commit primitives over the shared working tree, via the `git`
//! CLI. Both operations are idempotent: switching to the current branch and
//! committing a clean tree are no-ops.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::ports::{VcsDriver, VcsError};

pub struct GitDriver {
    repo_root: PathBuf,
}

impl GitDriver {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Run a git subcommand in the repository root, capturing stdout.
    async fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|_| VcsError::NotInstalled)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(VcsError::CommandFailed(format!(
                "git {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn branch_exists(&self, name: &str) -> bool {
        self.git(&["rev-parse", "--verify", "--quiet", &format!("refs/heads/{name}")])
            .await
            .is_ok()
    }

    async fn current_branch(&self) -> Result<String, VcsError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }
}

#[async_trait]
impl VcsDriver for GitDriver {
    async fn is_available(&self) -> bool {
        let installed = Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);
        if !installed {
            return false;
        }
        self.git(&["rev-parse", "--git-dir"]).await.is_ok()
    }

    #[instrument(skip(self))]
    async fn create_or_switch_branch(&self, name: &str) -> Result<(), VcsError> {
        if self.current_branch().await? == name {
            debug!(branch = name, "Already on branch");
            return Ok(());
        }
        if self.branch_exists(name).await {
            self.git(&["checkout", name]).await?;
        } else {
            self.git(&["checkout", "-b", name]).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn commit_all(&self, message: &str) -> Result<Option<String>, VcsError> {
        self.git(&["add", "-A"]).await?;
        let status = self.git(&["status", "--porcelain"]).await?;
        if status.is_empty() {
            debug!("Working tree clean, nothing to commit");
            return Ok(None);
        }
        self.git(&["commit", "-m", message]).await?;
        let sha = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(Some(sha))
    }
}
