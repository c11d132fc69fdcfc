//! Node-agent command payloads and timeout rules.
//!
//! The node agent exposes `POST /execute` taking `{command, args}` and
//! answering with the process outcome. Commands that must run inside a
//! directory are wrapped in `bash -c "cd <dir> && ..."` with every word
//! single-quoted, so arguments such as commit messages reach the process
//! verbatim.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default time a caller waits for a node command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Upper bound on a caller-supplied command timeout.
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 3600;

/// Request body sent to the node agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Outcome reported by the node agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Resolve the caller's timeout, falling back to `default_secs`.
pub fn resolve_timeout(requested_secs: Option<u64>, default_secs: u64) -> Result<Duration, CoreError> {
    let secs = requested_secs.unwrap_or(default_secs);
    if secs == 0 || secs > MAX_COMMAND_TIMEOUT_SECS {
        return Err(CoreError::Validation(format!(
            "timeout_secs must be between 1 and {MAX_COMMAND_TIMEOUT_SECS}"
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Quote a word for POSIX `sh`/`bash`.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Build the agent request for `command args...`, optionally inside `working_dir`.
pub fn build_command_request(
    command: &str,
    args: &[String],
    working_dir: Option<&str>,
) -> Result<CommandRequest, CoreError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(CoreError::Validation(
            "command must not be empty".to_string(),
        ));
    }

    let Some(dir) = working_dir.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(CommandRequest {
            command: command.to_string(),
            args: args.to_vec(),
        });
    };

    let mut script = format!("cd {} && {}", shell_quote(dir), shell_quote(command));
    for arg in args {
        script.push(' ');
        script.push_str(&shell_quote(arg));
    }
    Ok(CommandRequest {
        command: "bash".to_string(),
        args: vec!["-c".to_string(), script],
    })
}
