//! Route definitions for the `/issues` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::issues;
use crate::state::AppState;

/// Routes mounted at `/issues`.
///
/// ```text
/// GET    /                          -> list
/// POST   /                          -> create
/// GET    /pending/next              -> next_pending
/// GET    /{id}                      -> get_by_id
/// PUT    /{id}                      -> update
/// DELETE /{id}                      -> delete
/// POST   /{id}/process              -> process
/// POST   /{id}/commit-push          -> commit_push
/// POST   /{id}/report-branch        -> report_branch
/// POST   /{id}/terminate            -> terminate
/// POST   /{id}/restart              -> restart
/// POST   /{id}/merge                -> confirm_merge
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(issues::list).post(issues::create))
        .route("/pending/next", get(issues::next_pending))
        .route(
            "/{id}",
            get(issues::get_by_id)
                .put(issues::update)
                .delete(issues::delete),
        )
        .route("/{id}/process", post(issues::process))
        .route("/{id}/commit-push", post(issues::commit_push))
        .route("/{id}/report-branch", post(issues::report_branch))
        .route("/{id}/terminate", post(issues::terminate))
        .route("/{id}/restart", post(issues::restart))
        .route("/{id}/merge", post(issues::confirm_merge))
}
