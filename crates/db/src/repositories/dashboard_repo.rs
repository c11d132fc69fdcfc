//! Aggregate queries for the dashboard.

use sqlx::PgPool;
use issuefleet_core::status::{IssueStatus, NodeStatus};
use issuefleet_core::types::DbId;

use crate::models::dashboard::{
    DashboardStats, IssueCounts, NodeCounts, ResourceCounts, RunningTask,
};

/// Most recent running tasks returned by [`DashboardRepo::stats`].
pub const RUNNING_TASKS_LIMIT: i64 = 10;

pub struct DashboardRepo;

impl DashboardRepo {
    /// Counters and running tasks as seen by `owner_id`.
    ///
    /// Issues, projects, prompts and credentials are the owner's own; nodes
    /// are a shared fleet and counted in full.
    pub async fn stats(pool: &PgPool, owner_id: DbId) -> Result<DashboardStats, sqlx::Error> {
        let issues = Self::issue_counts(pool, owner_id).await?;
        let nodes = Self::node_counts(pool).await?;
        let resources = Self::resource_counts(pool, owner_id).await?;
        let running_tasks = Self::running_tasks(pool, owner_id, RUNNING_TASKS_LIMIT).await?;
        Ok(DashboardStats {
            issues,
            nodes,
            projects_count: resources.projects,
            prompts_count: resources.prompts,
            credentials_count: resources.credentials,
            running_tasks,
        })
    }

    pub async fn issue_counts(pool: &PgPool, owner_id: DbId) -> Result<IssueCounts, sqlx::Error> {
        sqlx::query_as::<_, IssueCounts>(
            "SELECT COUNT(*) FILTER (WHERE status_id = $2) AS pending, \
                    COUNT(*) FILTER (WHERE status_id = $3) AS processing, \
                    COUNT(*) FILTER (WHERE status_id = $4) AS pending_merge, \
                    COUNT(*) FILTER (WHERE status_id = $5) AS merged, \
                    COUNT(*) FILTER (WHERE status_id = $6) AS terminated, \
                    COUNT(*) AS total \
             FROM issues WHERE owner_id = $1",
        )
        .bind(owner_id)
        .bind(IssueStatus::Pending.id())
        .bind(IssueStatus::Processing.id())
        .bind(IssueStatus::PendingMerge.id())
        .bind(IssueStatus::Merged.id())
        .bind(IssueStatus::Terminated.id())
        .fetch_one(pool)
        .await
    }

    pub async fn node_counts(pool: &PgPool) -> Result<NodeCounts, sqlx::Error> {
        sqlx::query_as::<_, NodeCounts>(
            "SELECT COUNT(*) FILTER (WHERE status_id = $1) AS idle, \
                    COUNT(*) FILTER (WHERE status_id = $2) AS running, \
                    COUNT(*) FILTER (WHERE status_id = $3) AS offline, \
                    COUNT(*) AS total \
             FROM nodes WHERE deleted_at IS NULL",
        )
        .bind(NodeStatus::Idle.id())
        .bind(NodeStatus::Running.id())
        .bind(NodeStatus::Offline.id())
        .fetch_one(pool)
        .await
    }

    pub async fn resource_counts(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<ResourceCounts, sqlx::Error> {
        sqlx::query_as::<_, ResourceCounts>(
            "SELECT (SELECT COUNT(*) FROM projects WHERE owner_id = $1) AS projects, \
                    (SELECT COUNT(*) FROM prompts WHERE owner_id = $1) AS prompts, \
                    (SELECT COUNT(*) FROM credentials WHERE owner_id = $1) AS credentials",
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    /// `processing` issues with their node, most recently started first.
    pub async fn running_tasks(
        pool: &PgPool,
        owner_id: DbId,
        limit: i64,
    ) -> Result<Vec<RunningTask>, sqlx::Error> {
        sqlx::query_as::<_, RunningTask>(
            "SELECT i.id AS issue_id, i.title AS issue_title, \
                    n.id AS node_id, n.name AS node_name, i.started_at, \
                    GREATEST(EXTRACT(EPOCH FROM NOW() - i.started_at), 0)::bigint AS running_secs \
             FROM issues i \
             JOIN nodes n ON n.id = i.assigned_node_id \
             WHERE i.owner_id = $1 AND i.status_id = $2 AND i.started_at IS NOT NULL \
             ORDER BY i.started_at DESC, i.id DESC \
             LIMIT $3",
        )
        .bind(owner_id)
        .bind(IssueStatus::Processing.id())
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
