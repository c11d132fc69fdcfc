use std::sync::Arc;

use crate::config::ServerConfig;
use crate::executor::NodeExecutor;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: issuefleet_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs commands on node agents.
    pub executor: Arc<dyn NodeExecutor>,
}
