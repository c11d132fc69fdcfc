//! Route definitions for the `/nodes` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::nodes;
use crate::state::AppState;

/// Routes mounted at `/nodes`.
///
/// ```text
/// GET    /                          -> list
/// POST   /                          -> create
/// GET    /registration-key          -> registration_key
/// POST   /registration-key/rotate   -> rotate_registration_key
/// POST   /register                  -> register
/// POST   /heartbeat                 -> heartbeat
/// GET    /{id}                      -> get_by_id
/// PUT    /{id}                      -> update
/// DELETE /{id}                      -> delete
/// POST   /{id}/execute              -> execute
/// GET    /{id}/credential           -> credential
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(nodes::list).post(nodes::create))
        .route("/registration-key", get(nodes::registration_key))
        .route(
            "/registration-key/rotate",
            post(nodes::rotate_registration_key),
        )
        .route("/register", post(nodes::register))
        .route("/heartbeat", post(nodes::heartbeat))
        .route(
            "/{id}",
            get(nodes::get_by_id)
                .put(nodes::update)
                .delete(nodes::delete),
        )
        .route("/{id}/execute", post(nodes::execute))
        .route("/{id}/credential", get(nodes::credential))
}
