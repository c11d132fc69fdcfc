//! Handlers for inbound notifications from code hosts.

use axum::extract::State;
use axum::Json;
use issuefleet_db::models::issue::Issue;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::response::ListResponse;
use crate::state::AppState;
use crate::workflow::{self, MergeNotification};

/// POST /api/v1/webhooks/merge
///
/// Returns the issues that moved to `merged`; an unmatched branch yields an
/// empty list.
pub async fn merge(
    State(state): State<AppState>,
    AppJson(notification): AppJson<MergeNotification>,
) -> AppResult<Json<ListResponse<Issue>>> {
    let merged = workflow::confirm_merged_branch(&state, &notification).await?;
    Ok(Json(merged.into()))
}
