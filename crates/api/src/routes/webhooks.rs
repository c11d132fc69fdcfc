use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
pub fn router() -> Router<AppState> {
    Router::new().route("/merge", post(webhooks::merge))
}
