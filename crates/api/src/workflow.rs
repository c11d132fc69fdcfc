//! Coordinator steps that span the database and the node agents.
//!
//! Handlers stay thin: they parse input and call into this module, which
//! sequences repository transitions around node commands.

use std::time::Duration;

use issuefleet_core::command::{CommandRequest, CommandResult};
use issuefleet_core::credential::CredentialCategory;
use issuefleet_core::error::CoreError;
use issuefleet_core::lifecycle::{transition, IssueAction};
use issuefleet_core::types::DbId;
use issuefleet_core::workspace::{
    commit_push_plan, default_branch_name, default_commit_message, describe_step_failure,
    init_plan, validate_branch_name, WorkspaceStep,
};
use issuefleet_db::models::credential::Credential;
use issuefleet_db::models::issue::Issue;
use issuefleet_db::models::node::Node;
use issuefleet_db::repositories::{CredentialRepo, IssueRepo, NodeRepo};
use issuefleet_db::RepoError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// A claimed issue plus the credential bound for the run, if one was asked for.
///
/// `workspace` lists the checkout commands run on the node; it is empty when
/// the issue has no `repository_url`. A failed step leaves the claim in place
/// with `error_message` set on `issue`.
#[derive(Debug, Serialize)]
pub struct Dispatch {
    pub issue: Issue,
    pub credential: Option<Credential>,
    pub workspace: Vec<StepOutcome>,
}

/// One executed workspace command.
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub step: &'static str,
    pub result: CommandResult,
}

/// Result of a server-driven commit and push.
///
/// A failed step leaves the issue `processing` with `error_message` set;
/// `steps` then ends with the failing step.
#[derive(Debug, Serialize)]
pub struct CommitPushOutcome {
    pub issue: Issue,
    pub branch: String,
    pub steps: Vec<StepOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Success,
    Failed,
}

/// Body of `POST /issues/{id}/report-branch`, sent by a node agent that ran
/// the push itself.
#[derive(Debug, Deserialize)]
pub struct BranchReport {
    pub node_id: DbId,
    pub branch_name: Option<String>,
    pub status: PushStatus,
    pub error_message: Option<String>,
}

/// Provider-neutral merge notification.
#[derive(Debug, Deserialize)]
pub struct MergeNotification {
    pub repository_url: Option<String>,
    pub branch: String,
}

pub async fn find_node(state: &AppState, node_id: DbId) -> AppResult<Node> {
    NodeRepo::find_by_id(&state.pool, node_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "node",
            id: node_id,
        }))
}

pub async fn find_issue(state: &AppState, issue_id: DbId) -> AppResult<Issue> {
    IssueRepo::find_by_id(&state.pool, issue_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "issue",
            id: issue_id,
        }))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Bind a credential for a freshly claimed issue.
///
/// A missing credential does not undo the claim; it is logged and reported
/// as `null`.
pub async fn bind_credential(
    state: &AppState,
    node_id: DbId,
    category: Option<CredentialCategory>,
) -> AppResult<Option<Credential>> {
    let Some(category) = category else {
        return Ok(None);
    };
    match CredentialRepo::bind_for_node(&state.pool, node_id, category).await {
        Ok(credential) => {
            tracing::info!(node_id, credential_id = credential.id, %category, "Credential bound");
            Ok(Some(credential))
        }
        Err(RepoError::Core(CoreError::NoCredentialAvailable { .. })) => {
            tracing::warn!(node_id, %category, "No credential available for dispatched issue");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Claim a specific issue for a node.
pub async fn process_issue(
    state: &AppState,
    issue_id: DbId,
    node_id: DbId,
    category: Option<CredentialCategory>,
) -> AppResult<Dispatch> {
    let issue = IssueRepo::claim(&state.pool, issue_id, node_id, state.config.offline_timeout()).await?;
    let credential = bind_credential(state, node_id, category).await?;
    prepare_workspace(state, issue, credential).await
}

/// Claim the best eligible issue for a node.
pub async fn dispatch_next(
    state: &AppState,
    node_id: DbId,
    project_id: Option<DbId>,
    category: Option<CredentialCategory>,
) -> AppResult<Dispatch> {
    let issue = IssueRepo::claim_next(
        &state.pool,
        node_id,
        project_id,
        state.config.offline_timeout(),
    )
    .await?;
    let credential = bind_credential(state, node_id, category).await?;
    prepare_workspace(state, issue, credential).await
}

/// Clone the issue's repository into a fresh workspace on its node and check
/// out the result branch.
async fn prepare_workspace(
    state: &AppState,
    issue: Issue,
    credential: Option<Credential>,
) -> AppResult<Dispatch> {
    let url = issue
        .repository_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    let (Some(node_id), Some(url)) = (issue.assigned_node_id, url) else {
        return Ok(Dispatch {
            issue,
            credential,
            workspace: Vec::new(),
        });
    };
    let branch = default_branch_name(issue.id, issue.issue_number);
    let plan = init_plan(issue.id, &url, &branch)?;
    let node = find_node(state, node_id).await?;

    let run = run_steps(state, &node, issue.id, plan).await?;
    let issue = match run.failure {
        Some(reason) => IssueRepo::record_failure(&state.pool, issue.id, node_id, &reason).await?,
        None => {
            tracing::info!(issue_id = issue.id, node_id, %branch, "Workspace prepared");
            issue
        }
    };
    Ok(Dispatch {
        issue,
        credential,
        workspace: run.steps,
    })
}

// ---------------------------------------------------------------------------
// Node commands
// ---------------------------------------------------------------------------

/// Run one command on a node. Not retried on failure or timeout.
pub async fn execute_on_node(
    state: &AppState,
    node: &Node,
    request: &CommandRequest,
    timeout: Duration,
) -> AppResult<CommandResult> {
    let started = std::time::Instant::now();
    let result = state.executor.execute(node, request, timeout).await?;
    tracing::info!(
        node_id = node.id,
        command = %request.command,
        exit_code = result.exit_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Node command finished"
    );
    Ok(result)
}

/// Steps executed by [`run_steps`]; `failure` is set when the last one
/// exited non-zero.
struct StepRun {
    steps: Vec<StepOutcome>,
    failure: Option<String>,
}

/// Run `plan` in order on `node`, stopping at the first non-zero exit.
///
/// An executor error is recorded on the issue and then returned, so the
/// caller answers with the gateway status.
async fn run_steps(
    state: &AppState,
    node: &Node,
    issue_id: DbId,
    plan: Vec<(WorkspaceStep, CommandRequest)>,
) -> AppResult<StepRun> {
    let timeout = Duration::from_secs(state.config.node_command_timeout_secs);
    let mut steps = Vec::with_capacity(plan.len());
    for (step, request) in plan {
        let result = match execute_on_node(state, node, &request, timeout).await {
            Ok(result) => result,
            Err(err) => {
                let reason = format!("{} failed: {err}", step.command_label());
                IssueRepo::record_failure(&state.pool, issue_id, node.id, &reason).await?;
                return Err(err);
            }
        };

        let failure = (!result.succeeded()).then(|| describe_step_failure(step, &result));
        steps.push(StepOutcome {
            step: step.as_str(),
            result,
        });
        if failure.is_some() {
            return Ok(StepRun { steps, failure });
        }
    }
    Ok(StepRun {
        steps,
        failure: None,
    })
}

/// `git add`, `git commit`, `git push` in the issue workspace on its node.
pub async fn commit_and_push(
    state: &AppState,
    issue_id: DbId,
    node_id: DbId,
    commit_message: Option<&str>,
) -> AppResult<CommitPushOutcome> {
    let issue = find_issue(state, issue_id).await?;
    transition(issue.status, IssueAction::PushSucceeded)?;
    if issue.assigned_node_id != Some(node_id) {
        return Err(CoreError::Conflict(format!(
            "Issue {issue_id} is not assigned to node {node_id}"
        ))
        .into());
    }
    let node = find_node(state, node_id).await?;

    let branch = default_branch_name(issue.id, issue.issue_number);
    let message = match commit_message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => default_commit_message(issue.id, issue.issue_number, &issue.title),
    };
    let plan = commit_push_plan(issue.id, &message, &branch)?;

    let run = run_steps(state, &node, issue_id, plan).await?;
    let issue = match run.failure {
        Some(reason) => IssueRepo::record_failure(&state.pool, issue_id, node_id, &reason).await?,
        None => IssueRepo::record_push_success(&state.pool, issue_id, node_id, &branch).await?,
    };
    Ok(CommitPushOutcome {
        issue,
        branch,
        steps: run.steps,
    })
}

/// Record a push the node agent performed on its own.
pub async fn report_branch(
    state: &AppState,
    issue_id: DbId,
    report: &BranchReport,
) -> AppResult<Issue> {
    match report.status {
        PushStatus::Success => {
            let branch = match report.branch_name.as_deref().map(str::trim) {
                Some(b) if !b.is_empty() => b.to_string(),
                _ => {
                    let issue = find_issue(state, issue_id).await?;
                    default_branch_name(issue.id, issue.issue_number)
                }
            };
            validate_branch_name(&branch)?;
            Ok(IssueRepo::record_push_success(&state.pool, issue_id, report.node_id, &branch).await?)
        }
        PushStatus::Failed => {
            let reason = report
                .error_message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("push failed");
            Ok(IssueRepo::record_failure(&state.pool, issue_id, report.node_id, reason).await?)
        }
    }
}

// ---------------------------------------------------------------------------
// Merge confirmation
// ---------------------------------------------------------------------------

/// Confirm every `pending_merge` issue whose result branch matches.
///
/// Issues that change state concurrently are skipped.
pub async fn confirm_merged_branch(
    state: &AppState,
    notification: &MergeNotification,
) -> AppResult<Vec<Issue>> {
    let branch = notification.branch.trim();
    if branch.is_empty() {
        return Err(CoreError::Validation("branch must not be empty".to_string()).into());
    }
    let candidates = IssueRepo::find_pending_merge_by_branch(
        &state.pool,
        notification.repository_url.as_deref(),
        branch,
    )
    .await?;

    let mut merged = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match IssueRepo::confirm_merge(&state.pool, candidate.id).await {
            Ok(issue) => merged.push(issue),
            Err(RepoError::Core(e)) => {
                tracing::warn!(issue_id = candidate.id, error = %e, "Skipping merge confirmation");
            }
            Err(RepoError::Database(e)) => return Err(e.into()),
        }
    }
    tracing::info!(branch, merged = merged.len(), "Merge notification processed");
    Ok(merged)
}
