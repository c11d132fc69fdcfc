//! Handlers for the dashboard overview.

use axum::extract::State;
use axum::Json;
use issuefleet_db::models::dashboard::DashboardStats;
use issuefleet_db::repositories::DashboardRepo;

use crate::context::RequestContext;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/dashboard/stats
///
/// Issue and configuration counters for the calling owner, fleet-wide node
/// counters, and the ten most recently started running tasks.
pub async fn stats(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DashboardStats>>> {
    let stats = DashboardRepo::stats(&state.pool, ctx.owner_id).await?;
    Ok(Json(DataResponse { data: stats }))
}
