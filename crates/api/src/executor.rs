//! Client for the node agent's `POST /execute` endpoint.
//!
//! Handlers reach nodes through the [`NodeExecutor`] trait so integration
//! tests can substitute a scripted fake for the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use issuefleet_core::command::{CommandRequest, CommandResult};
use issuefleet_db::models::node::Node;

/// Errors from running a command on a node.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The HTTP request itself failed (connection refused, DNS, TLS, bad body).
    #[error("request to node agent failed: {0}")]
    Request(#[from] reqwest::Error),

    /// No answer within the caller's timeout. The command may still be running.
    #[error("node agent did not answer within {secs}s")]
    Timeout { secs: u64 },

    /// The agent answered with a non-2xx status.
    #[error("node agent error ({status}): {body}")]
    Agent { status: u16, body: String },
}

/// Runs a single command on a node and reports its outcome.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        node: &Node,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandResult, ExecutorError>;
}

/// [`NodeExecutor`] talking HTTP to `http://{node.ip}:{agent_port}/execute`.
pub struct HttpNodeExecutor {
    client: reqwest::Client,
    agent_port: u16,
}

impl HttpNodeExecutor {
    pub fn new(agent_port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            agent_port,
        }
    }
}

#[async_trait]
impl NodeExecutor for HttpNodeExecutor {
    async fn execute(
        &self,
        node: &Node,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandResult, ExecutorError> {
        let url = agent_url(&node.ip, self.agent_port);
        tracing::debug!(node_id = node.id, %url, command = %request.command, "Executing command on node");

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Agent {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CommandResult>()
            .await
            .map_err(|e| classify_request_error(e, timeout))
    }
}

fn classify_request_error(err: reqwest::Error, timeout: Duration) -> ExecutorError {
    if err.is_timeout() {
        ExecutorError::Timeout {
            secs: timeout.as_secs(),
        }
    } else {
        ExecutorError::Request(err)
    }
}

/// Agent endpoint for a node address; IPv6 literals are bracketed.
pub fn agent_url(ip: &str, port: u16) -> String {
    if ip.contains(':') && !ip.starts_with('[') {
        format!("http://[{ip}]:{port}/execute")
    } else {
        format!("http://{ip}:{port}/execute")
    }
}
