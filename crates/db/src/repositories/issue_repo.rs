//! Repository for `issues` and `issue_dependencies`.
//!
//! Every lifecycle transition is a single conditional `UPDATE` keyed on the
//! statuses [`IssueAction::allowed_from`] permits. When the write matches no
//! row the current state is read back and turned into a precise error by
//! [`explain_failed_transition`].

use chrono::Duration;
use issuefleet_core::dependency_graph::DependencyGraph;
use issuefleet_core::error::CoreError;
use issuefleet_core::lifecycle::{
    ensure_deletable, ensure_editable, explain_failed_transition, IssueAction,
};
use issuefleet_core::queue::QUEUE_ORDER_SQL;
use issuefleet_core::status::{IssueStatus, StatusId};
use issuefleet_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::error::RepoError;
use crate::models::issue::{CreateIssue, Issue, IssueFilter, UpdateIssue};
use crate::repositories::NodeRepo;

/// Column list for `issues` queries. Dependencies are aggregated per row.
const COLUMNS: &str = "\
    id, owner_id, project_id, title, description, repository_url, issue_number, \
    status_id, priority, assigned_node_id, \
    ARRAY(SELECT d.depends_on_id FROM issue_dependencies d \
          WHERE d.issue_id = issues.id ORDER BY d.depends_on_id) AS dependency_issue_ids, \
    error_message, result_branch, created_at, updated_at, started_at, completed_at";

/// Transaction-scoped advisory lock serializing dependency-graph edits.
const DEPENDENCY_LOCK_KEY: i64 = 0x6973_7375_6564_6570;

/// Eligibility predicate over alias `q`, given the parameter numbers bound
/// to the pending and merged status ids.
fn eligible_sql(pending_param: u8, merged_param: u8) -> String {
    format!(
        "q.status_id = ${pending_param} AND q.assigned_node_id IS NULL \
         AND NOT EXISTS (\
             SELECT 1 FROM issue_dependencies d JOIN issues dep ON dep.id = d.depends_on_id \
             WHERE d.issue_id = q.id AND dep.status_id <> ${merged_param}\
         )"
    )
}

fn status_ids(statuses: &[IssueStatus]) -> Vec<StatusId> {
    statuses.iter().map(|s| s.id()).collect()
}

/// Provides CRUD, queue, and lifecycle operations for issues.
pub struct IssueRepo;

impl IssueRepo {
    // ── Queries ──────────────────────────────────────────────────────────

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Issue>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM issues WHERE id = $1");
        sqlx::query_as::<_, Issue>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List issues, newest first, with optional filters.
    pub async fn list(pool: &PgPool, filter: &IssueFilter) -> Result<Vec<Issue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM issues \
             WHERE ($1::smallint IS NULL OR status_id = $1) \
               AND ($2::bigint IS NULL OR project_id = $2) \
               AND ($3::bigint IS NULL OR assigned_node_id = $3) \
               AND ($4::bigint IS NULL OR owner_id = $4) \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Issue>(&query)
            .bind(filter.status.map(IssueStatus::id))
            .bind(filter.project_id)
            .bind(filter.assigned_node_id)
            .bind(filter.owner_id)
            .fetch_all(pool)
            .await
    }

    /// The issue a claim would pick right now, without claiming it.
    pub async fn peek_next(
        pool: &PgPool,
        project_id: Option<DbId>,
    ) -> Result<Option<Issue>, sqlx::Error> {
        let eligible = eligible_sql(1, 2);
        let query = format!(
            "SELECT {COLUMNS} FROM issues WHERE id = (\
                 SELECT q.id FROM issues q \
                 WHERE {eligible} AND ($3::bigint IS NULL OR q.project_id = $3) \
                 ORDER BY {QUEUE_ORDER_SQL} LIMIT 1\
             )"
        );
        sqlx::query_as::<_, Issue>(&query)
            .bind(IssueStatus::Pending.id())
            .bind(IssueStatus::Merged.id())
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Issues that list `issue_id` as a dependency.
    pub async fn dependents(
        conn: &mut PgConnection,
        issue_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT issue_id FROM issue_dependencies WHERE depends_on_id = $1 ORDER BY issue_id",
        )
        .bind(issue_id)
        .fetch_all(&mut *conn)
        .await
    }

    /// Pending-merge issues whose result branch matches, optionally scoped to a repository.
    pub async fn find_pending_merge_by_branch(
        pool: &PgPool,
        repository_url: Option<&str>,
        branch: &str,
    ) -> Result<Vec<Issue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM issues \
             WHERE status_id = $1 AND result_branch = $2 \
               AND ($3::text IS NULL OR repository_url = $3) \
             ORDER BY id"
        );
        sqlx::query_as::<_, Issue>(&query)
            .bind(IssueStatus::PendingMerge.id())
            .bind(branch)
            .bind(repository_url)
            .fetch_all(pool)
            .await
    }

    // ── CRUD ─────────────────────────────────────────────────────────────

    /// Create a pending issue with its dependency edges.
    ///
    /// `dependencies` must already be normalized (sorted, deduplicated). A new
    /// issue has no dependents, so its edges cannot close a cycle.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateIssue,
        dependencies: &[DbId],
    ) -> Result<Issue, RepoError> {
        let mut tx = pool.begin().await?;
        if !dependencies.is_empty() {
            lock_dependency_graph(&mut tx).await?;
            ensure_issues_exist(&mut tx, dependencies).await?;
        }

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO issues \
                (owner_id, project_id, title, description, repository_url, issue_number, priority, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(owner_id)
        .bind(input.project_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(&input.repository_url)
        .bind(input.issue_number)
        .bind(i16::from(input.priority.unwrap_or_default()))
        .bind(IssueStatus::Pending.id())
        .fetch_one(&mut *tx)
        .await?;

        insert_dependencies(&mut tx, id, dependencies).await?;
        let issue = fetch_in_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(issue)
    }

    /// Edit an issue's descriptive fields, priority, project, and dependencies.
    ///
    /// `dependencies`, when `Some`, replaces the whole set after the graph
    /// check. Merged issues are immutable.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateIssue,
        dependencies: Option<&[DbId]>,
    ) -> Result<Issue, RepoError> {
        let mut tx = pool.begin().await?;
        // Graph lock before the row lock: inserting an edge takes a key-share
        // lock on the referenced issue, so the opposite order can deadlock.
        if dependencies.is_some() {
            lock_dependency_graph(&mut tx).await?;
        }

        let current = lock_issue(&mut tx, id).await?;
        ensure_editable(current.status)?;
        ensure_read_only_fields_unchanged(&current, input.status, input.assigned_node_id)?;

        sqlx::query(
            "UPDATE issues SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                repository_url = COALESCE($4, repository_url),
                issue_number = COALESCE($5, issue_number),
                priority = COALESCE($6, priority),
                project_id = COALESCE($7, project_id)
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(&input.repository_url)
        .bind(input.issue_number)
        .bind(input.priority.map(i16::from))
        .bind(input.project_id)
        .execute(&mut *tx)
        .await?;

        if let Some(dependencies) = dependencies {
            ensure_issues_exist(&mut tx, dependencies).await?;
            let graph = load_dependency_graph(&mut tx).await?;
            graph.check_dependencies(id, dependencies)?;

            sqlx::query("DELETE FROM issue_dependencies WHERE issue_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_dependencies(&mut tx, id, dependencies).await?;
        }

        let issue = fetch_in_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(issue)
    }

    /// Delete an issue that holds no node and that nothing depends on.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<(), RepoError> {
        let mut tx = pool.begin().await?;
        lock_dependency_graph(&mut tx).await?;

        let current = lock_issue(&mut tx, id).await?;
        ensure_deletable(current.status)?;

        let dependents = Self::dependents(&mut tx, id).await?;
        if !dependents.is_empty() {
            return Err(CoreError::DependencyInUse {
                issue_id: id,
                dependents,
            }
            .into());
        }

        sqlx::query("DELETE FROM issues WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ── Claim ────────────────────────────────────────────────────────────

    /// Atomically pick the best eligible issue and assign it to `node_id`.
    ///
    /// The node flip (`idle → running`) and the issue claim run in one
    /// transaction; either both happen or neither does.
    pub async fn claim_next(
        pool: &PgPool,
        node_id: DbId,
        project_id: Option<DbId>,
        liveness_timeout: Duration,
    ) -> Result<Issue, RepoError> {
        let mut tx = pool.begin().await?;
        if !NodeRepo::try_occupy(&mut tx, node_id, liveness_timeout).await? {
            drop(tx);
            return Err(NodeRepo::explain_unavailable(pool, node_id, liveness_timeout)
                .await?
                .into());
        }

        let eligible = eligible_sql(3, 4);
        let query = format!(
            "UPDATE issues SET status_id = $2, assigned_node_id = $1, \
                started_at = NOW(), completed_at = NULL, error_message = NULL \
             WHERE id = (\
                 SELECT q.id FROM issues q \
                 WHERE {eligible} AND ($5::bigint IS NULL OR q.project_id = $5) \
                 ORDER BY {QUEUE_ORDER_SQL} LIMIT 1 \
                 FOR UPDATE SKIP LOCKED\
             ) \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, Issue>(&query)
            .bind(node_id)
            .bind(IssueStatus::Processing.id())
            .bind(IssueStatus::Pending.id())
            .bind(IssueStatus::Merged.id())
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(issue) = claimed else {
            return Err(CoreError::NoWorkAvailable.into());
        };
        tx.commit().await?;
        tracing::info!(issue_id = issue.id, node_id, "Issue claimed from queue");
        Ok(issue)
    }

    /// Claim one specific issue for `node_id`.
    ///
    /// Of several concurrent claims on the same issue exactly one succeeds;
    /// the others fail with [`CoreError::AlreadyClaimed`].
    pub async fn claim(
        pool: &PgPool,
        issue_id: DbId,
        node_id: DbId,
        liveness_timeout: Duration,
    ) -> Result<Issue, RepoError> {
        let mut tx = pool.begin().await?;
        let occupied = NodeRepo::try_occupy(&mut tx, node_id, liveness_timeout).await?;

        let claimed = if occupied {
            let eligible = eligible_sql(4, 5);
            let query = format!(
                "UPDATE issues q SET status_id = $3, assigned_node_id = $2, \
                    started_at = NOW(), completed_at = NULL, error_message = NULL \
                 WHERE q.id = $1 AND {eligible} \
                 RETURNING {}",
                COLUMNS.replace("issues.id", "q.id")
            );
            sqlx::query_as::<_, Issue>(&query)
                .bind(issue_id)
                .bind(node_id)
                .bind(IssueStatus::Processing.id())
                .bind(IssueStatus::Pending.id())
                .bind(IssueStatus::Merged.id())
                .fetch_optional(&mut *tx)
                .await?
        } else {
            None
        };

        match claimed {
            Some(issue) => {
                tx.commit().await?;
                tracing::info!(issue_id, node_id, "Issue claimed");
                Ok(issue)
            }
            None => {
                tx.rollback().await?;
                Err(Self::explain_failed_claim(pool, issue_id, node_id, liveness_timeout).await?)
            }
        }
    }

    /// Issue-side problems win over node-side ones so that losers of a race
    /// on the same issue always see `AlreadyClaimed`.
    async fn explain_failed_claim(
        pool: &PgPool,
        issue_id: DbId,
        node_id: DbId,
        liveness_timeout: Duration,
    ) -> Result<RepoError, sqlx::Error> {
        let Some(issue) = Self::find_by_id(pool, issue_id).await? else {
            return Ok(CoreError::NotFound {
                entity: "issue",
                id: issue_id,
            }
            .into());
        };
        if issue.status != IssueStatus::Pending || issue.assigned_node_id.is_some() {
            return Ok(explain_failed_transition(issue.status, IssueAction::Claim, issue_id).into());
        }

        let unmerged: Vec<DbId> = sqlx::query_scalar(
            "SELECT d.depends_on_id FROM issue_dependencies d \
             JOIN issues dep ON dep.id = d.depends_on_id \
             WHERE d.issue_id = $1 AND dep.status_id <> $2 ORDER BY d.depends_on_id",
        )
        .bind(issue_id)
        .bind(IssueStatus::Merged.id())
        .fetch_all(pool)
        .await?;
        if !unmerged.is_empty() {
            return Ok(CoreError::Conflict(format!(
                "Issue {issue_id} has unmerged dependencies {unmerged:?}"
            ))
            .into());
        }

        Ok(NodeRepo::explain_unavailable(pool, node_id, liveness_timeout)
            .await?
            .into())
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// `processing → pending_merge`: the node pushed `branch`. Frees the node.
    pub async fn record_push_success(
        pool: &PgPool,
        issue_id: DbId,
        node_id: DbId,
        branch: &str,
    ) -> Result<Issue, RepoError> {
        let action = IssueAction::PushSucceeded;
        let mut tx = pool.begin().await?;
        NodeRepo::lock(&mut tx, node_id).await?;
        let query = format!(
            "UPDATE issues SET status_id = $3, result_branch = $4, error_message = NULL \
             WHERE id = $1 AND assigned_node_id = $2 AND status_id = ANY($5) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue_id)
            .bind(node_id)
            .bind(action.target().id())
            .bind(branch)
            .bind(status_ids(action.allowed_from()))
            .fetch_optional(&mut *tx)
            .await?;

        let Some(issue) = updated else {
            drop(tx);
            return Err(Self::explain_failed(pool, issue_id, action).await?);
        };
        NodeRepo::release(&mut tx, node_id).await?;
        tx.commit().await?;
        tracing::info!(issue_id, node_id, branch, "Issue pushed, awaiting merge");
        Ok(issue)
    }

    /// `processing → processing`: record a failed workspace or push step.
    /// No automatic retry.
    pub async fn record_failure(
        pool: &PgPool,
        issue_id: DbId,
        node_id: DbId,
        error_message: &str,
    ) -> Result<Issue, RepoError> {
        let action = IssueAction::StepFailed;
        let query = format!(
            "UPDATE issues SET error_message = $3 \
             WHERE id = $1 AND assigned_node_id = $2 AND status_id = ANY($4) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue_id)
            .bind(node_id)
            .bind(error_message)
            .bind(status_ids(action.allowed_from()))
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(issue) => {
                tracing::warn!(issue_id, node_id, error = error_message, "Issue step failed");
                Ok(issue)
            }
            None => Err(Self::explain_failed(pool, issue_id, action).await?),
        }
    }

    /// `processing | pending_merge → terminated`. Frees the node.
    pub async fn terminate(
        pool: &PgPool,
        issue_id: DbId,
        reason: Option<&str>,
    ) -> Result<Issue, RepoError> {
        let action = IssueAction::Terminate;
        let (mut tx, previous_node) = loop {
            let seen: Option<DbId> = sqlx::query_scalar::<_, Option<DbId>>(
                "SELECT assigned_node_id FROM issues WHERE id = $1",
            )
            .bind(issue_id)
            .fetch_optional(pool)
            .await?
            .flatten();

            let mut tx = pool.begin().await?;
            if let Some(node_id) = seen {
                NodeRepo::lock(&mut tx, node_id).await?;
            }
            let locked: Option<Option<DbId>> = sqlx::query_scalar(
                "SELECT assigned_node_id FROM issues WHERE id = $1 FOR UPDATE",
            )
            .bind(issue_id)
            .fetch_optional(&mut *tx)
            .await?;
            // Re-read under the lock; a claim in between means the wrong node is held.
            match locked {
                Some(current) if current != seen => tx.rollback().await?,
                _ => break (tx, seen),
            }
        };

        let query = format!(
            "UPDATE issues SET status_id = $2, assigned_node_id = NULL, completed_at = NOW(), \
                error_message = COALESCE($3, error_message) \
             WHERE id = $1 AND status_id = ANY($4) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue_id)
            .bind(action.target().id())
            .bind(reason)
            .bind(status_ids(action.allowed_from()))
            .fetch_optional(&mut *tx)
            .await?;

        let Some(issue) = updated else {
            drop(tx);
            return Err(Self::explain_failed(pool, issue_id, action).await?);
        };
        if let Some(node_id) = previous_node {
            NodeRepo::release(&mut tx, node_id).await?;
        }
        tx.commit().await?;
        tracing::info!(issue_id, "Issue terminated");
        Ok(issue)
    }

    /// `pending_merge → merged` (terminal).
    pub async fn confirm_merge(pool: &PgPool, issue_id: DbId) -> Result<Issue, RepoError> {
        let action = IssueAction::ConfirmMerge;
        let query = format!(
            "UPDATE issues SET status_id = $2, assigned_node_id = NULL, completed_at = NOW() \
             WHERE id = $1 AND status_id = ANY($3) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue_id)
            .bind(action.target().id())
            .bind(status_ids(action.allowed_from()))
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(issue) => {
                tracing::info!(issue_id, "Issue merged");
                Ok(issue)
            }
            None => Err(Self::explain_failed(pool, issue_id, action).await?),
        }
    }

    /// `terminated → pending`, clearing everything the previous run recorded.
    pub async fn restart(pool: &PgPool, issue_id: DbId) -> Result<Issue, RepoError> {
        let action = IssueAction::Restart;
        let query = format!(
            "UPDATE issues SET status_id = $2, assigned_node_id = NULL, error_message = NULL, \
                started_at = NULL, completed_at = NULL, result_branch = NULL \
             WHERE id = $1 AND status_id = ANY($3) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue_id)
            .bind(action.target().id())
            .bind(status_ids(action.allowed_from()))
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(issue) => {
                tracing::info!(issue_id, "Issue restarted");
                Ok(issue)
            }
            None => Err(Self::explain_failed(pool, issue_id, action).await?),
        }
    }

    async fn explain_failed(
        pool: &PgPool,
        issue_id: DbId,
        action: IssueAction,
    ) -> Result<RepoError, sqlx::Error> {
        let current: Option<StatusId> =
            sqlx::query_scalar("SELECT status_id FROM issues WHERE id = $1")
                .bind(issue_id)
                .fetch_optional(pool)
                .await?;
        let err = match current.map(IssueStatus::try_from) {
            None => CoreError::NotFound {
                entity: "issue",
                id: issue_id,
            },
            Some(Ok(status)) => explain_failed_transition(status, action, issue_id),
            Some(Err(e)) => e,
        };
        Ok(err.into())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Status and assignment of a row locked `FOR UPDATE`.
struct LockedIssue {
    status: IssueStatus,
    assigned_node_id: Option<DbId>,
}

async fn lock_issue(conn: &mut PgConnection, id: DbId) -> Result<LockedIssue, RepoError> {
    let row: Option<(StatusId, Option<DbId>)> = sqlx::query_as(
        "SELECT status_id, assigned_node_id FROM issues WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let (status_id, assigned_node_id) = row.ok_or(CoreError::NotFound {
        entity: "issue",
        id,
    })?;
    Ok(LockedIssue {
        status: IssueStatus::try_from(status_id)?,
        assigned_node_id,
    })
}

/// `status` and `assigned_node_id` are owned by the lifecycle; an edit may
/// echo them back but never change them.
fn ensure_read_only_fields_unchanged(
    current: &LockedIssue,
    status: Option<IssueStatus>,
    assigned_node_id: Option<DbId>,
) -> Result<(), CoreError> {
    if let Some(status) = status.filter(|s| *s != current.status) {
        return Err(CoreError::Validation(format!(
            "status is read-only (current: {}, requested: {status})",
            current.status
        )));
    }
    if assigned_node_id.is_some() && assigned_node_id != current.assigned_node_id {
        return Err(CoreError::Validation(
            "assigned_node_id is read-only; use the claim endpoints".to_string(),
        ));
    }
    Ok(())
}

async fn lock_dependency_graph(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(DEPENDENCY_LOCK_KEY)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn load_dependency_graph(conn: &mut PgConnection) -> Result<DependencyGraph, sqlx::Error> {
    let edges: Vec<(DbId, DbId)> =
        sqlx::query_as("SELECT issue_id, depends_on_id FROM issue_dependencies")
            .fetch_all(&mut *conn)
            .await?;
    Ok(DependencyGraph::from_edges(edges))
}

async fn ensure_issues_exist(conn: &mut PgConnection, ids: &[DbId]) -> Result<(), RepoError> {
    let found: Vec<DbId> = sqlx::query_scalar("SELECT id FROM issues WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    let missing: Vec<DbId> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!(
            "Unknown dependency issue ids: {missing:?}"
        ))
        .into());
    }
    Ok(())
}

async fn insert_dependencies(
    conn: &mut PgConnection,
    issue_id: DbId,
    dependencies: &[DbId],
) -> Result<(), sqlx::Error> {
    if dependencies.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO issue_dependencies (issue_id, depends_on_id) \
         SELECT $1, UNNEST($2::bigint[])",
    )
    .bind(issue_id)
    .bind(dependencies)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_in_tx(conn: &mut PgConnection, id: DbId) -> Result<Issue, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM issues WHERE id = $1");
    sqlx::query_as::<_, Issue>(&query)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

