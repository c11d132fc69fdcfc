//! Per-request caller context.
//!
//! The caller's identity and selected project travel as explicit headers and
//! are extracted into a [`RequestContext`] value. There is no server-side
//! "current project".

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use issuefleet_core::error::CoreError;
use issuefleet_core::types::DbId;

use crate::error::AppError;

/// Header carrying the owner id. Defaults to [`DEFAULT_OWNER_ID`].
pub const OWNER_HEADER: &str = "x-owner-id";

/// Header carrying the selected project id, if any.
pub const PROJECT_HEADER: &str = "x-project-id";

pub const DEFAULT_OWNER_ID: DbId = 1;

/// Caller context extracted from request headers.
///
/// ```ignore
/// async fn list(ctx: RequestContext, State(state): State<AppState>) -> AppResult<...> {
///     ProjectRepo::list(&state.pool, ctx.owner_id).await?;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub owner_id: DbId,
    pub project_id: Option<DbId>,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner_id = id_header(&parts.headers, OWNER_HEADER)?.unwrap_or(DEFAULT_OWNER_ID);
        let project_id = id_header(&parts.headers, PROJECT_HEADER)?;
        Ok(RequestContext {
            owner_id,
            project_id,
        })
    }
}

fn id_header(headers: &HeaderMap, name: &str) -> Result<Option<DbId>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let id = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<DbId>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| CoreError::Validation(format!("{name} must be a positive integer")))?;
    Ok(Some(id))
}
