//! Route definitions for the `/credentials` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::credentials;
use crate::state::AppState;

/// Routes mounted at `/credentials`.
///
/// ```text
/// GET    /                          -> list
/// POST   /                          -> create
/// GET    /{id}                      -> get_by_id
/// PUT    /{id}                      -> update
/// DELETE /{id}                      -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(credentials::list).post(credentials::create))
        .route(
            "/{id}",
            get(credentials::get_by_id)
                .put(credentials::update)
                .delete(credentials::delete),
        )
}
