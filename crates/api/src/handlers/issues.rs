//! Handlers for the `/issues` resource and the dispatch workflow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use issuefleet_core::dependency_graph::normalize_dependency_ids;
use issuefleet_core::error::CoreError;
use issuefleet_core::issue::{validate_issue_details, validate_issue_title};
use issuefleet_core::status::IssueStatus;
use issuefleet_core::types::DbId;
use issuefleet_db::models::issue::{CreateIssue, Issue, IssueFilter, UpdateIssue};
use issuefleet_db::repositories::{IssueRepo, ProjectRepo};
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::query::{CommitPushParams, DispatchParams, IssueListParams};
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;
use crate::workflow::{self, BranchReport, CommitPushOutcome, Dispatch};

#[derive(Debug, Deserialize)]
pub struct TerminateParams {
    pub reason: Option<String>,
}

async fn ensure_project_exists(
    state: &AppState,
    ctx: RequestContext,
    project_id: Option<DbId>,
) -> AppResult<()> {
    if let Some(id) = project_id {
        if ProjectRepo::find_by_id(&state.pool, ctx.owner_id, id).await?.is_none() {
            return Err(CoreError::Validation(format!("Unknown project id {id}")).into());
        }
    }
    Ok(())
}

/// Load an issue owned by the caller. Other owners' issues read as missing.
async fn find_owned(state: &AppState, ctx: RequestContext, id: DbId) -> AppResult<Issue> {
    let issue = workflow::find_issue(state, id).await?;
    if issue.owner_id != ctx.owner_id {
        return Err(CoreError::NotFound { entity: "issue", id }.into());
    }
    Ok(issue)
}

/// GET /api/v1/issues
pub async fn list(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<IssueListParams>,
) -> AppResult<Json<ListResponse<Issue>>> {
    let filter = IssueFilter {
        owner_id: Some(ctx.owner_id),
        status: params.status,
        project_id: params.project_id.or(ctx.project_id),
        assigned_node_id: params.assigned_node_id,
    };
    let issues = IssueRepo::list(&state.pool, &filter).await?;
    Ok(Json(issues.into()))
}

/// POST /api/v1/issues
pub async fn create(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(mut input): AppJson<CreateIssue>,
) -> AppResult<(StatusCode, Json<DataResponse<Issue>>)> {
    validate_issue_title(&input.title)?;
    validate_issue_details(
        input.description.as_deref(),
        input.repository_url.as_deref(),
        input.issue_number,
    )?;
    if input.status.is_some_and(|s| s != IssueStatus::Pending) {
        return Err(CoreError::Validation("New issues always start as pending".to_string()).into());
    }
    if input.assigned_node_id.is_some() {
        return Err(CoreError::Validation(
            "assigned_node_id is set by dispatch, not on create".to_string(),
        )
        .into());
    }

    let dependencies =
        normalize_dependency_ids(input.dependency_issue_ids.as_deref().unwrap_or_default())?;
    input.project_id = input.project_id.or(ctx.project_id);
    ensure_project_exists(&state, ctx, input.project_id).await?;

    let issue = IssueRepo::create(&state.pool, ctx.owner_id, &input, &dependencies).await?;
    tracing::info!(issue_id = issue.id, owner_id = ctx.owner_id, "Issue created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: issue })))
}

/// GET /api/v1/issues/{id}
pub async fn get_by_id(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Issue>>> {
    let issue = find_owned(&state, ctx, id).await?;
    Ok(Json(DataResponse { data: issue }))
}

/// PUT /api/v1/issues/{id}
pub async fn update(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateIssue>,
) -> AppResult<Json<DataResponse<Issue>>> {
    find_owned(&state, ctx, id).await?;
    if let Some(title) = &input.title {
        validate_issue_title(title)?;
    }
    validate_issue_details(
        input.description.as_deref(),
        input.repository_url.as_deref(),
        input.issue_number,
    )?;
    let dependencies = input
        .dependency_issue_ids
        .as_deref()
        .map(normalize_dependency_ids)
        .transpose()?;
    ensure_project_exists(&state, ctx, input.project_id).await?;

    let issue = IssueRepo::update(&state.pool, id, &input, dependencies.as_deref()).await?;
    Ok(Json(DataResponse { data: issue }))
}

/// DELETE /api/v1/issues/{id}
pub async fn delete(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    find_owned(&state, ctx, id).await?;
    IssueRepo::delete(&state.pool, id).await?;
    tracing::info!(issue_id = id, "Issue deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/issues/pending/next
///
/// With `node_id` the best eligible issue is claimed for that node; without
/// it the call only previews what would be dispatched next.
pub async fn next_pending(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<DispatchParams>,
) -> AppResult<Json<DataResponse<Dispatch>>> {
    let dispatch = match params.node_id {
        Some(node_id) => {
            workflow::dispatch_next(&state, node_id, ctx.project_id, params.category).await?
        }
        None => {
            let issue = IssueRepo::peek_next(&state.pool, ctx.project_id)
                .await?
                .ok_or(AppError::Core(CoreError::NoWorkAvailable))?;
            Dispatch {
                issue,
                credential: None,
                workspace: Vec::new(),
            }
        }
    };
    Ok(Json(DataResponse { data: dispatch }))
}

/// POST /api/v1/issues/{id}/process
pub async fn process(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppQuery(params): AppQuery<DispatchParams>,
) -> AppResult<Json<DataResponse<Dispatch>>> {
    let node_id = params
        .node_id
        .ok_or_else(|| CoreError::Validation("node_id is required".to_string()))?;
    let dispatch = workflow::process_issue(&state, id, node_id, params.category).await?;
    Ok(Json(DataResponse { data: dispatch }))
}

/// POST /api/v1/issues/{id}/commit-push
pub async fn commit_push(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppQuery(params): AppQuery<CommitPushParams>,
) -> AppResult<Json<DataResponse<CommitPushOutcome>>> {
    let outcome =
        workflow::commit_and_push(&state, id, params.node_id, params.commit_message.as_deref())
            .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/issues/{id}/report-branch
pub async fn report_branch(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(report): AppJson<BranchReport>,
) -> AppResult<Json<DataResponse<Issue>>> {
    let issue = workflow::report_branch(&state, id, &report).await?;
    Ok(Json(DataResponse { data: issue }))
}

/// POST /api/v1/issues/{id}/terminate
pub async fn terminate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppQuery(params): AppQuery<TerminateParams>,
) -> AppResult<Json<DataResponse<Issue>>> {
    let issue = IssueRepo::terminate(&state.pool, id, params.reason.as_deref()).await?;
    Ok(Json(DataResponse { data: issue }))
}

/// POST /api/v1/issues/{id}/restart
pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Issue>>> {
    let issue = IssueRepo::restart(&state.pool, id).await?;
    Ok(Json(DataResponse { data: issue }))
}

/// POST /api/v1/issues/{id}/merge
pub async fn confirm_merge(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Issue>>> {
    let issue = IssueRepo::confirm_merge(&state.pool, id).await?;
    Ok(Json(DataResponse { data: issue }))
}
