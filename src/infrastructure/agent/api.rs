//! HTTP API agent invoker.
//!
//! Variant of the invoker port for a remote generation endpoint (a cloud or
//! locally hosted model server). The endpoint streams plain text; chunks
//! are forwarded as they arrive. Selected in settings; the engine never
//! branches on the variant.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::domain::ports::{AgentError, AgentInvoker, AgentOutcome, AgentRequest};

/// Configuration for the API invoker.
#[derive(Debug, Clone)]
pub struct ApiInvokerConfig {
    /// Base URL of the generation endpoint
    pub base_url: String,
    /// Timeout for one invocation, in seconds
    pub timeout_secs: u64,
}

/// Invoker that calls a remote generation endpoint over HTTP.
pub struct ApiAgentInvoker {
    config: ApiInvokerConfig,
    client: reqwest::Client,
}

impl ApiAgentInvoker {
    pub fn new(config: ApiInvokerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AgentInvoker for ApiAgentInvoker {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.endpoint("health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    async fn invoke(
        &self,
        request: AgentRequest,
        chunks: mpsc::Sender<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<AgentOutcome, AgentError> {
        if *cancel.borrow_and_update() {
            return Err(AgentError::Cancelled);
        }

        let body = serde_json::json!({
            "task_id": request.task_id,
            "model": request.model,
            "prompt": request.description,
            "context": request.context,
        });

        let response = self
            .client
            .post(self.endpoint("v1/generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AgentError::NotInstalled(self.config.base_url.clone())
                } else {
                    AgentError::ProcessFailed(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::ProcessFailed(format!(
                "endpoint returned {status}: {}",
                detail.trim()
            )));
        }

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut stream = response.bytes_stream();
        let mut output = String::new();

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes).to_string();
                        output.push_str(&text);
                        let _ = chunks.send(text).await;
                    }
                    Some(Err(e)) => {
                        return Err(AgentError::ProcessFailed(format!("stream error: {e}")));
                    }
                    None => break,
                },
                changed = cancel.changed() => {
                    // Dropping the stream aborts the HTTP request
                    if changed.is_err() || *cancel.borrow() {
                        return Err(AgentError::Cancelled);
                    }
                },
                () = sleep_until(deadline) => {
                    return Err(AgentError::Timeout(self.config.timeout_secs));
                }
            }
        }

        debug!(bytes = output.len(), "API invocation complete");
        let final_message = output
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .to_string();
        Ok(AgentOutcome {
            success: true,
            final_message,
        })
    }
}
