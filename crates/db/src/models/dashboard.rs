//! Read-only aggregates behind `GET /dashboard/stats`.

use serde::Serialize;
use sqlx::FromRow;
use issuefleet_core::types::{DbId, Timestamp};

/// Issue counts per lifecycle status.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct IssueCounts {
    pub pending: i64,
    pub processing: i64,
    pub pending_merge: i64,
    pub merged: i64,
    pub terminated: i64,
    pub total: i64,
}

/// Node counts per status. Deleted nodes are not counted.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct NodeCounts {
    pub idle: i64,
    pub running: i64,
    pub offline: i64,
    pub total: i64,
}

/// Owned configuration rows.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct ResourceCounts {
    pub projects: i64,
    pub prompts: i64,
    pub credentials: i64,
}

/// A `processing` issue and the node working on it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunningTask {
    pub issue_id: DbId,
    pub issue_title: String,
    pub node_id: DbId,
    pub node_name: String,
    pub started_at: Timestamp,
    pub running_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub issues: IssueCounts,
    pub nodes: NodeCounts,
    pub projects_count: i64,
    pub prompts_count: i64,
    pub credentials_count: i64,
    pub running_tasks: Vec<RunningTask>,
}
