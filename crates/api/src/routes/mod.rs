pub mod credentials;
pub mod dashboard;
pub mod health;
pub mod issues;
pub mod nodes;
pub mod projects;
pub mod prompts;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /issues                                          list, create
/// /issues/{id}                                     get, update, delete
/// /issues/pending/next                             preview or dispatch next issue
/// /issues/{id}/process                             claim for a node (POST)
/// /issues/{id}/commit-push                         server-driven push (POST)
/// /issues/{id}/report-branch                       node-driven push report (POST)
/// /issues/{id}/terminate                           terminate (POST)
/// /issues/{id}/restart                             restart (POST)
/// /issues/{id}/merge                               confirm merge (POST)
///
/// /nodes                                           list, create
/// /nodes/{id}                                      get, update, delete
/// /nodes/registration-key                          active key + docker command
/// /nodes/registration-key/rotate                   rotate key (POST)
/// /nodes/register                                  agent registration (POST)
/// /nodes/heartbeat                                 agent heartbeat (POST)
/// /nodes/{id}/execute                              run a command (POST)
/// /nodes/{id}/credential                           bind a credential
///
/// /credentials                                     list, create
/// /credentials/{id}                                get, update, delete
///
/// /projects                                        list, create
/// /projects/{id}                                   get, update, delete
///
/// /prompts                                         list, create
/// /prompts/{id}                                    get, update, delete
///
/// /dashboard/stats                                 counters and running tasks
///
/// /webhooks/merge                                  merge notification (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/issues", issues::router())
        .nest("/nodes", nodes::router())
        .nest("/credentials", credentials::router())
        .nest("/projects", projects::router())
        .nest("/prompts", prompts::router())
        .nest("/dashboard", dashboard::router())
        .nest("/webhooks", webhooks::router())
}
