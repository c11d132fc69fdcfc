//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use issuefleet_core::error::CoreError;
use issuefleet_core::project::{normalize_repository_urls, validate_project};
use issuefleet_core::types::DbId;
use issuefleet_db::models::project::{CreateProject, Project, UpdateProject};
use issuefleet_db::repositories::ProjectRepo;

use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "project",
        id,
    })
}

/// POST /api/v1/projects
pub async fn create(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    validate_project(&input.name, input.description.as_deref())?;
    let urls = normalize_repository_urls(input.repository_urls.as_deref().unwrap_or_default())?;
    let project = ProjectRepo::create(&state.pool, ctx.owner_id, &input, &urls).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Project>>> {
    let projects = ProjectRepo::list(&state.pool, ctx.owner_id).await?;
    Ok(Json(projects.into()))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = ProjectRepo::find_by_id(&state.pool, ctx.owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/projects/{id}
pub async fn update(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateProject>,
) -> AppResult<Json<DataResponse<Project>>> {
    let current = ProjectRepo::find_by_id(&state.pool, ctx.owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    validate_project(
        input.name.as_deref().unwrap_or(&current.name),
        input.description.as_deref(),
    )?;
    let urls = input
        .repository_urls
        .as_deref()
        .map(normalize_repository_urls)
        .transpose()?;

    let project = ProjectRepo::update(&state.pool, ctx.owner_id, id, &input, urls.as_deref())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: project }))
}

/// DELETE /api/v1/projects/{id}
///
/// Issues of the project are kept and detached.
pub async fn delete(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if ProjectRepo::delete(&state.pool, ctx.owner_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
