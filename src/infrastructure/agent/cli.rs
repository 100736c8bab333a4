//! CLI agent invoker.
//!
//! Shells out to the configured code-generation CLI. The prompt is written
//! to stdin; stdout is streamed line by line as output chunks. The tool
//! must be installed and authenticated separately.
//!
//! Semantic completion: if the final stdout line is a JSON object with a
//! boolean `success` field (and optional `message`), that is the completion
//! signal; otherwise a zero exit code counts as success. A non-zero exit is
//! an invocation failure, not a semantic result.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, warn};

use crate::domain::ports::{AgentError, AgentInvoker, AgentOutcome, AgentRequest};

/// How long a terminated process gets to exit before SIGKILL.
const TERMINATE_GRACE_SECS: u64 = 5;

/// Configuration for the CLI invoker.
#[derive(Debug, Clone)]
pub struct CliInvokerConfig {
    /// Agent command line; the first word is the program, the rest are args
    pub command: String,
    /// Working directory for the agent process
    pub working_dir: Option<PathBuf>,
    /// Timeout for one invocation, in seconds
    pub timeout_secs: u64,
}

impl Default for CliInvokerConfig {
    fn default() -> Self {
        Self {
            command: "agent".to_string(),
            working_dir: None,
            timeout_secs: 600,
        }
    }
}

/// Invoker that drives a local agent CLI subprocess.
pub struct CliAgentInvoker {
    config: CliInvokerConfig,
}

impl CliAgentInvoker {
    pub fn new(config: CliInvokerConfig) -> Self {
        Self { config }
    }

    fn program_and_args(&self) -> (String, Vec<String>) {
        let mut parts = self.config.command.split_whitespace();
        let program = parts.next().unwrap_or("agent").to_string();
        let args = parts.map(ToString::to_string).collect();
        (program, args)
    }

    fn build_command(&self, request: &AgentRequest) -> Command {
        let (program, args) = self.program_and_args();
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.env("AGENT_MODEL", &request.model);
        for (key, value) in &request.env_overrides {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn format_prompt(request: &AgentRequest) -> String {
        let mut prompt = String::new();
        if !request.context.is_empty() {
            prompt.push_str("[Context]\n");
            prompt.push_str(&request.context);
            prompt.push('\n');
        }
        prompt.push_str(&request.description);
        prompt
    }
}

#[async_trait]
impl AgentInvoker for CliAgentInvoker {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn is_available(&self) -> bool {
        let (program, _) = self.program_and_args();
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn invoke(
        &self,
        request: AgentRequest,
        chunks: mpsc::Sender<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<AgentOutcome, AgentError> {
        if !self.is_available().await {
            return Err(AgentError::NotInstalled(self.config.command.clone()));
        }
        if *cancel.borrow_and_update() {
            return Err(AgentError::Cancelled);
        }

        let mut child = self
            .build_command(&request)
            .spawn()
            .map_err(|e| AgentError::ProcessFailed(format!("failed to spawn agent: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::ProcessFailed("failed to get stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::ProcessFailed("failed to get stdout handle".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::ProcessFailed("failed to get stderr handle".to_string()))?;

        let prompt = Self::format_prompt(&request);
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| AgentError::ProcessFailed(format!("failed to write prompt: {e}")))?;
        drop(stdin);

        // Collect stderr concurrently so a chatty process cannot deadlock
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut lines = BufReader::new(stdout).lines();
        let mut output = String::new();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        output.push_str(&line);
                        output.push('\n');
                        let _ = chunks.send(line).await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        return Err(AgentError::ProcessFailed(format!("failed to read output: {e}")));
                    }
                },
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        graceful_terminate(&mut child).await;
                        return Err(AgentError::Cancelled);
                    }
                },
                () = sleep_until(deadline) => {
                    warn!(timeout_secs = self.config.timeout_secs, "Agent invocation timed out");
                    let _ = child.kill().await;
                    return Err(AgentError::Timeout(self.config.timeout_secs));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AgentError::ProcessFailed(format!("failed to wait for agent: {e}")))?;
        let errors = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(AgentError::ProcessFailed(format!(
                "agent exited with code {:?}: {}",
                status.code(),
                errors.trim()
            )));
        }

        debug!(bytes = output.len(), "Agent invocation complete");
        Ok(parse_outcome(&output))
    }
}

/// Gracefully stop a child: SIGTERM, a grace window, then SIGKILL.
async fn graceful_terminate(child: &mut Child) {
    if let Some(pid) = child.id().and_then(|p| i32::try_from(p).ok()) {
        let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
        if timeout(Duration::from_secs(TERMINATE_GRACE_SECS), child.wait())
            .await
            .is_err()
        {
            let _ = child.kill().await;
        }
    } else {
        let _ = child.kill().await;
    }
}

/// Derive the semantic outcome from a zero-exit run.
fn parse_outcome(output: &str) -> AgentOutcome {
    let last = output.lines().rev().find(|l| !l.trim().is_empty());
    if let Some(line) = last {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) {
            if let Some(success) = value.get("success").and_then(serde_json::Value::as_bool) {
                let final_message = value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return AgentOutcome { success, final_message };
            }
        }
    }
    AgentOutcome {
        success: true,
        final_message: last.unwrap_or_default().to_string(),
    }
}
