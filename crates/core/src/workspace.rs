//! Issue workspace layout and the command sequences run in it: checkout
//! preparation on dispatch, commit-and-push once the agent is done.

use crate::command::{build_command_request, CommandRequest, CommandResult};
use crate::error::CoreError;
use crate::types::DbId;

/// Root directory under which each issue gets its own checkout on a node.
pub const WORKSPACE_ROOT: &str = "/workspace";

const MAX_BRANCH_LEN: usize = 255;
const MAX_STDERR_IN_MESSAGE: usize = 500;

pub fn workspace_path(issue_id: DbId) -> String {
    format!("{WORKSPACE_ROOT}/issue-{issue_id}")
}

/// `ai/issue-{number}` when the issue tracks an upstream number, else `ai/task-{id}`.
pub fn default_branch_name(issue_id: DbId, issue_number: Option<i32>) -> String {
    match issue_number {
        Some(n) => format!("ai/issue-{n}"),
        None => format!("ai/task-{issue_id}"),
    }
}

pub fn default_commit_message(issue_id: DbId, issue_number: Option<i32>, title: &str) -> String {
    match issue_number {
        Some(n) => format!("Fix issue #{n}: {title}"),
        None => format!("Fix task {issue_id}: {title}"),
    }
}

/// Subset of `git check-ref-format` rules for branch names.
pub fn validate_branch_name(name: &str) -> Result<(), CoreError> {
    let invalid = name.is_empty()
        || name.len() > MAX_BRANCH_LEN
        || name.starts_with('-')
        || name.starts_with('/')
        || name.ends_with('/')
        || name.ends_with('.')
        || name.ends_with(".lock")
        || name.contains("..")
        || name.contains("//")
        || name.contains("@{")
        || name
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || "~^:?*[\\".contains(c));
    if invalid {
        return Err(CoreError::Validation(format!(
            "Invalid branch name: \"{name}\""
        )));
    }
    Ok(())
}

/// One command of a workspace sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStep {
    Clean,
    Mkdir,
    Clone,
    Checkout,
    Add,
    Commit,
    Push,
}

impl WorkspaceStep {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceStep::Clean => "clean",
            WorkspaceStep::Mkdir => "mkdir",
            WorkspaceStep::Clone => "clone",
            WorkspaceStep::Checkout => "checkout",
            WorkspaceStep::Add => "add",
            WorkspaceStep::Commit => "commit",
            WorkspaceStep::Push => "push",
        }
    }

    /// Command name as it appears in failure messages.
    pub fn command_label(self) -> &'static str {
        match self {
            WorkspaceStep::Clean => "rm -rf",
            WorkspaceStep::Mkdir => "mkdir -p",
            WorkspaceStep::Clone => "git clone",
            WorkspaceStep::Checkout => "git checkout",
            WorkspaceStep::Add => "git add",
            WorkspaceStep::Commit => "git commit",
            WorkspaceStep::Push => "git push",
        }
    }
}

fn git_in(dir: &str, args: &[&str]) -> Result<CommandRequest, CoreError> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    build_command_request("git", &args, Some(dir))
}

/// Fresh checkout for a newly claimed issue: drop any leftover workspace
/// from an earlier run, recreate it, clone into it and branch off.
pub fn init_plan(
    issue_id: DbId,
    repository_url: &str,
    branch: &str,
) -> Result<Vec<(WorkspaceStep, CommandRequest)>, CoreError> {
    let url = repository_url.trim();
    if url.is_empty() {
        return Err(CoreError::Validation(
            "repository_url must not be empty".to_string(),
        ));
    }
    if url.starts_with('-') {
        return Err(CoreError::Validation(format!(
            "Invalid repository_url: \"{url}\""
        )));
    }
    validate_branch_name(branch)?;

    let dir = workspace_path(issue_id);
    Ok(vec![
        (
            WorkspaceStep::Clean,
            build_command_request("rm", &["-rf".to_string(), dir.clone()], None)?,
        ),
        (
            WorkspaceStep::Mkdir,
            build_command_request("mkdir", &["-p".to_string(), dir.clone()], None)?,
        ),
        (WorkspaceStep::Clone, git_in(&dir, &["clone", url, "."])?),
        (WorkspaceStep::Checkout, git_in(&dir, &["checkout", "-b", branch])?),
    ])
}

/// `git add .`, `git commit -m <message>`, `git push origin <branch>`,
/// each run inside the issue workspace.
pub fn commit_push_plan(
    issue_id: DbId,
    commit_message: &str,
    branch: &str,
) -> Result<Vec<(WorkspaceStep, CommandRequest)>, CoreError> {
    if commit_message.trim().is_empty() {
        return Err(CoreError::Validation(
            "commit_message must not be empty".to_string(),
        ));
    }
    validate_branch_name(branch)?;

    let dir = workspace_path(issue_id);
    Ok(vec![
        (WorkspaceStep::Add, git_in(&dir, &["add", "."])?),
        (WorkspaceStep::Commit, git_in(&dir, &["commit", "-m", commit_message])?),
        (WorkspaceStep::Push, git_in(&dir, &["push", "origin", branch])?),
    ])
}

/// Error message recorded on the issue when a step exits non-zero.
pub fn describe_step_failure(step: WorkspaceStep, result: &CommandResult) -> String {
    let detail = if result.stderr.trim().is_empty() {
        result.stdout.trim()
    } else {
        result.stderr.trim()
    };
    let detail: String = detail.chars().take(MAX_STDERR_IN_MESSAGE).collect();
    if detail.is_empty() {
        format!("{} failed with exit code {}", step.command_label(), result.exit_code)
    } else {
        format!(
            "{} failed with exit code {}: {detail}",
            step.command_label(),
            result.exit_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_issue_number_when_present() {
        assert_eq!(workspace_path(12), "/workspace/issue-12");
        assert_eq!(default_branch_name(12, Some(345)), "ai/issue-345");
        assert_eq!(default_branch_name(12, None), "ai/task-12");
        assert_eq!(
            default_commit_message(12, Some(345), "Crash on save"),
            "Fix issue #345: Crash on save"
        );
        assert_eq!(
            default_commit_message(12, None, "Crash on save"),
            "Fix task 12: Crash on save"
        );
    }

    #[test]
    fn branch_name_rules() {
        assert!(validate_branch_name("ai/issue-7").is_ok());
        for bad in ["", "-x", "a..b", "a b", "a~1", "topic.lock", "x/", "a@{1}"] {
            assert!(validate_branch_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn plan_runs_three_git_steps_in_workspace() {
        let plan = commit_push_plan(4, "Fix issue #9: typo", "ai/issue-9").unwrap();
        let steps: Vec<WorkspaceStep> = plan.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            steps,
            vec![WorkspaceStep::Add, WorkspaceStep::Commit, WorkspaceStep::Push]
        );
        for (_, req) in &plan {
            assert_eq!(req.command, "bash");
            assert!(req.args[1].starts_with("cd /workspace/issue-4 && git "));
        }
        assert!(plan[2].1.args[1].ends_with("git push origin ai/issue-9"));
    }

    #[test]
    fn plan_rejects_bad_inputs() {
        assert!(commit_push_plan(4, " ", "ai/issue-9").is_err());
        assert!(commit_push_plan(4, "msg", "bad branch").is_err());
    }

    #[test]
    fn failure_message_prefers_stderr() {
        let result = CommandResult {
            command: "bash".into(),
            args: vec![],
            exit_code: 128,
            stdout: "ignored".into(),
            stderr: "fatal: could not read Username\n".into(),
            duration_ms: 40,
        };
        assert_eq!(
            describe_step_failure(WorkspaceStep::Push, &result),
            "git push failed with exit code 128: fatal: could not read Username"
        );
    }

    #[test]
    fn init_plan_recreates_workspace_then_clones_and_branches() {
        let plan = init_plan(4, " https://github.com/acme/widgets ", "ai/issue-9").unwrap();
        let steps: Vec<WorkspaceStep> = plan.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            steps,
            vec![
                WorkspaceStep::Clean,
                WorkspaceStep::Mkdir,
                WorkspaceStep::Clone,
                WorkspaceStep::Checkout
            ]
        );
        assert_eq!(plan[0].1.command, "rm");
        assert_eq!(plan[0].1.args, vec!["-rf", "/workspace/issue-4"]);
        assert_eq!(plan[1].1.command, "mkdir");
        assert_eq!(plan[1].1.args, vec!["-p", "/workspace/issue-4"]);
        assert_eq!(
            plan[2].1.args[1],
            "cd /workspace/issue-4 && git clone https://github.com/acme/widgets ."
        );
        assert_eq!(
            plan[3].1.args[1],
            "cd /workspace/issue-4 && git checkout -b ai/issue-9"
        );
    }

    #[test]
    fn init_plan_rejects_bad_inputs() {
        assert!(init_plan(4, "  ", "ai/issue-9").is_err());
        assert!(init_plan(4, "--upload-pack=evil", "ai/issue-9").is_err());
        assert!(init_plan(4, "https://github.com/acme/widgets", "a..b").is_err());
    }

    #[test]
    fn failure_message_names_non_git_commands() {
        let result = CommandResult {
            command: "mkdir".into(),
            args: vec![],
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 2,
        };
        assert_eq!(
            describe_step_failure(WorkspaceStep::Mkdir, &result),
            "mkdir -p failed with exit code 1"
        );
    }
}
