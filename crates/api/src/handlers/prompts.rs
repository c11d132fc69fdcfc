//! Handlers for the `/prompts` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use issuefleet_core::error::CoreError;
use issuefleet_core::project::validate_prompt;
use issuefleet_core::types::DbId;
use issuefleet_db::models::prompt::{CreatePrompt, Prompt, UpdatePrompt};
use issuefleet_db::repositories::PromptRepo;

use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "prompt",
        id,
    })
}

/// POST /api/v1/prompts
pub async fn create(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(input): AppJson<CreatePrompt>,
) -> AppResult<(StatusCode, Json<DataResponse<Prompt>>)> {
    validate_prompt(
        &input.name,
        &input.content,
        input.tags.as_deref().unwrap_or_default(),
    )?;
    let prompt = PromptRepo::create(&state.pool, ctx.owner_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: prompt })))
}

/// GET /api/v1/prompts
pub async fn list(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Prompt>>> {
    let prompts = PromptRepo::list(&state.pool, ctx.owner_id).await?;
    Ok(Json(prompts.into()))
}

/// GET /api/v1/prompts/{id}
pub async fn get_by_id(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Prompt>>> {
    let prompt = PromptRepo::find_by_id(&state.pool, ctx.owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: prompt }))
}

/// PUT /api/v1/prompts/{id}
pub async fn update(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdatePrompt>,
) -> AppResult<Json<DataResponse<Prompt>>> {
    let current = PromptRepo::find_by_id(&state.pool, ctx.owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    validate_prompt(
        input.name.as_deref().unwrap_or(&current.name),
        input.content.as_deref().unwrap_or(&current.content),
        input.tags.as_deref().unwrap_or(&current.tags),
    )?;

    let prompt = PromptRepo::update(&state.pool, ctx.owner_id, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: prompt }))
}

/// DELETE /api/v1/prompts/{id}
pub async fn delete(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if PromptRepo::delete(&state.pool, ctx.owner_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
