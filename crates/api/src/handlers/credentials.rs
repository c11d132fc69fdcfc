//! Handlers for the `/credentials` resource.
//!
//! Responses mask `pat` and `password`; only the node credential endpoint
//! hands out the plain secret.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use issuefleet_core::credential::{validate_credential_text, validate_secrets, CredentialSecrets};
use issuefleet_core::error::CoreError;
use issuefleet_core::types::DbId;
use issuefleet_db::models::credential::{CreateCredential, MaskedCredential, UpdateCredential};
use issuefleet_db::repositories::CredentialRepo;

use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "credential",
        id,
    })
}

fn dedup_ids(ids: &mut Option<Vec<DbId>>) {
    if let Some(ids) = ids {
        ids.sort_unstable();
        ids.dedup();
    }
}

/// GET /api/v1/credentials
pub async fn list(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<MaskedCredential>>> {
    let credentials = CredentialRepo::list(&state.pool, ctx.owner_id).await?;
    let masked: Vec<MaskedCredential> = credentials.into_iter().map(Into::into).collect();
    Ok(Json(masked.into()))
}

/// POST /api/v1/credentials
pub async fn create(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(mut input): AppJson<CreateCredential>,
) -> AppResult<(StatusCode, Json<DataResponse<MaskedCredential>>)> {
    validate_credential_text(&input.title, input.description.as_deref())?;
    validate_secrets(input.category, &input.secrets())?;
    dedup_ids(&mut input.node_ids);

    let credential = CredentialRepo::create(&state.pool, ctx.owner_id, &input).await?;
    tracing::info!(
        credential_id = credential.id,
        category = %credential.category,
        "Credential created"
    );
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: credential.into(),
        }),
    ))
}

/// GET /api/v1/credentials/{id}
pub async fn get_by_id(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<MaskedCredential>>> {
    let credential = CredentialRepo::find_by_id(&state.pool, ctx.owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse {
        data: credential.into(),
    }))
}

/// PUT /api/v1/credentials/{id}
///
/// The merged result (stored values overlaid with the request) must satisfy
/// the category's secret requirements.
pub async fn update(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(mut input): AppJson<UpdateCredential>,
) -> AppResult<Json<DataResponse<MaskedCredential>>> {
    let current = CredentialRepo::find_by_id(&state.pool, ctx.owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    validate_credential_text(
        input.title.as_deref().unwrap_or(&current.title),
        input.description.as_deref(),
    )?;
    let merged = CredentialSecrets {
        pat: input.pat.clone().or(current.pat),
        username: input.username.clone().or(current.username),
        password: input.password.clone().or(current.password),
        service: input.service.clone().or(current.service),
    };
    validate_secrets(input.category.unwrap_or(current.category), &merged)?;
    dedup_ids(&mut input.node_ids);

    let credential = CredentialRepo::update(&state.pool, ctx.owner_id, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse {
        data: credential.into(),
    }))
}

/// DELETE /api/v1/credentials/{id}
pub async fn delete(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if CredentialRepo::delete(&state.pool, ctx.owner_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
