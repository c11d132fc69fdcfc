//! Repository for the `nodes` table: admin CRUD, self-registration,
//! heartbeats, the offline sweep, and the node half of a claim.

use chrono::Duration;
use issuefleet_core::error::CoreError;
use issuefleet_core::lifecycle::NODE_UNRESPONSIVE_MESSAGE;
use issuefleet_core::node_pool::{is_stale, reconcile_heartbeat_status};
use issuefleet_core::status::{IssueStatus, NodeStatus};
use issuefleet_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::error::RepoError;
use crate::models::node::{CreateNode, Node, RegisterNode, SweepOutcome, UpdateNode};
use crate::repositories::RegistrationKeyRepo;

/// Column list for `nodes` queries.
const COLUMNS: &str = "\
    id, name, ip, description, tags, status_id, last_heartbeat, \
    registration_key_hash, created_at, updated_at, deleted_at";

/// SQL for a node's status: the `running_param` value while the node holds an
/// issue in the `processing_param` status, otherwise `fallback_param`.
fn status_for_occupancy(processing_param: u8, running_param: u8, fallback_param: u8) -> String {
    format!(
        "CASE WHEN EXISTS (\
             SELECT 1 FROM issues i WHERE i.assigned_node_id = nodes.id AND i.status_id = ${processing_param}\
         ) THEN ${running_param} ELSE ${fallback_param} END"
    )
}

fn secs(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

/// Provides CRUD, liveness, and dispatch operations for nodes.
pub struct NodeRepo;

impl NodeRepo {
    // ── Queries ──────────────────────────────────────────────────────────

    /// Find a non-deleted node by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Node>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List non-deleted nodes ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Node>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM nodes WHERE deleted_at IS NULL ORDER BY name ASC");
        sqlx::query_as::<_, Node>(&query).fetch_all(pool).await
    }

    /// Return the subset of `ids` that do not name a live (non-deleted) node.
    pub async fn missing_ids(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM nodes WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
        let mut missing: Vec<DbId> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
        missing.sort_unstable();
        missing.dedup();
        Ok(missing)
    }

    // ── Admin mutations ──────────────────────────────────────────────────

    /// Create a node record. It stays `offline` until the agent heartbeats.
    pub async fn create(pool: &PgPool, input: &CreateNode) -> Result<Node, sqlx::Error> {
        let query = format!(
            "INSERT INTO nodes (name, ip, description, tags, status_id) \
             VALUES ($1, $2, $3, COALESCE($4::text[], '{{}}'), $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(&input.name)
            .bind(&input.ip)
            .bind(&input.description)
            .bind(&input.tags)
            .bind(NodeStatus::Offline.id())
            .fetch_one(pool)
            .await
    }

    /// Update editable fields. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateNode,
    ) -> Result<Option<Node>, sqlx::Error> {
        let query = format!(
            "UPDATE nodes SET
                name = COALESCE($2, name),
                ip = COALESCE($3, ip),
                description = COALESCE($4, description),
                tags = COALESCE($5::text[], tags)
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.ip)
            .bind(&input.description)
            .bind(&input.tags)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a node. Blocked while an issue is assigned to it.
    ///
    /// Returns `false` if no live node with that id exists.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, RepoError> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM nodes WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let active: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM issues WHERE assigned_node_id = $1 AND status_id = ANY($2) ORDER BY id",
        )
        .bind(id)
        .bind(vec![IssueStatus::Processing.id(), IssueStatus::PendingMerge.id()])
        .fetch_all(&mut *tx)
        .await?;
        if !active.is_empty() {
            return Err(CoreError::Conflict(format!(
                "Node {id} is assigned to active issues {active:?}"
            ))
            .into());
        }

        sqlx::query(
            "UPDATE nodes SET deleted_at = NOW(), status_id = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(NodeStatus::Offline.id())
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM credential_nodes WHERE node_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    // ── Agent-facing operations ──────────────────────────────────────────

    /// Register (or re-activate by name) a node presenting a registration key.
    ///
    /// The key check and the upsert share one transaction so a concurrent
    /// rotation cannot slip between them.
    pub async fn register(pool: &PgPool, input: &RegisterNode) -> Result<Node, RepoError> {
        let mut tx = pool.begin().await?;
        let key = RegistrationKeyRepo::verify(&mut tx, &input.registration_key).await?;

        let status = status_for_occupancy(7, 8, 5);
        let query = format!(
            "INSERT INTO nodes (name, ip, description, tags, status_id, last_heartbeat, registration_key_hash) \
             VALUES ($1, $2, $3, COALESCE($4::text[], '{{}}'), $5, NOW(), $6) \
             ON CONFLICT (name) DO UPDATE SET \
                ip = EXCLUDED.ip, \
                description = COALESCE(EXCLUDED.description, nodes.description), \
                tags = COALESCE($4::text[], nodes.tags), \
                status_id = {status}, \
                last_heartbeat = NOW(), \
                registration_key_hash = EXCLUDED.registration_key_hash, \
                deleted_at = NULL \
             RETURNING {COLUMNS}"
        );
        let node = sqlx::query_as::<_, Node>(&query)
            .bind(&input.name)
            .bind(&input.ip)
            .bind(&input.description)
            .bind(&input.tags)
            .bind(NodeStatus::Idle.id())
            .bind(&key.key_hash)
            .bind(IssueStatus::Processing.id())
            .bind(NodeStatus::Running.id())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(node_id = node.id, name = %node.name, "Node registered");
        Ok(node)
    }

    /// Record a heartbeat. Last write wins.
    ///
    /// A node holding a processing issue stays `running` regardless of what it
    /// reports; see [`reconcile_heartbeat_status`].
    pub async fn heartbeat(
        pool: &PgPool,
        node_id: DbId,
        reported: NodeStatus,
        at: Timestamp,
    ) -> Result<Node, RepoError> {
        let status = status_for_occupancy(3, 4, 5);
        let query = format!(
            "UPDATE nodes SET last_heartbeat = $2, status_id = {status} \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&query)
            .bind(node_id)
            .bind(at)
            .bind(IssueStatus::Processing.id())
            .bind(reconcile_heartbeat_status(reported, true).id())
            .bind(reconcile_heartbeat_status(reported, false).id())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "node",
                    id: node_id,
                }
                .into()
            })
    }

    /// Mark stale nodes `offline` and terminate the issues they were processing.
    ///
    /// Both updates are conditional: a node that heartbeats, or an issue that
    /// is pushed, before this transaction takes its row lock is left alone.
    pub async fn sweep_stale(pool: &PgPool, timeout: Duration) -> Result<SweepOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let offline_node_ids: Vec<DbId> = sqlx::query_scalar(
            "UPDATE nodes SET status_id = $1 \
             WHERE deleted_at IS NULL AND status_id <> $1 \
               AND (last_heartbeat IS NULL OR last_heartbeat < NOW() - make_interval(secs => $2)) \
             RETURNING id",
        )
        .bind(NodeStatus::Offline.id())
        .bind(secs(timeout))
        .fetch_all(&mut *tx)
        .await?;

        let terminated_issue_ids: Vec<DbId> = if offline_node_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_scalar(
                "UPDATE issues SET status_id = $2, assigned_node_id = NULL, \
                    completed_at = NOW(), error_message = $3 \
                 WHERE assigned_node_id = ANY($1) AND status_id = $4 \
                 RETURNING id",
            )
            .bind(&offline_node_ids)
            .bind(IssueStatus::Terminated.id())
            .bind(NODE_UNRESPONSIVE_MESSAGE)
            .bind(IssueStatus::Processing.id())
            .fetch_all(&mut *tx)
            .await?
        };

        tx.commit().await?;
        Ok(SweepOutcome {
            offline_node_ids,
            terminated_issue_ids,
        })
    }

    // ── Dispatch helpers (run inside the caller's transaction) ───────────

    /// Flip a live idle node to `running`. Returns `false` if the node is
    /// missing, deleted, busy, offline, or has a stale heartbeat.
    pub async fn try_occupy(
        conn: &mut PgConnection,
        node_id: DbId,
        liveness_timeout: Duration,
    ) -> Result<bool, sqlx::Error> {
        let occupied: Option<DbId> = sqlx::query_scalar(
            "UPDATE nodes SET status_id = $2 \
             WHERE id = $1 AND status_id = $3 AND deleted_at IS NULL \
               AND last_heartbeat >= NOW() - make_interval(secs => $4) \
             RETURNING id",
        )
        .bind(node_id)
        .bind(NodeStatus::Running.id())
        .bind(NodeStatus::Idle.id())
        .bind(secs(liveness_timeout))
        .fetch_optional(&mut *conn)
        .await?;
        Ok(occupied.is_some())
    }

    /// Row-lock a node ahead of any `issues` row it is assigned to.
    ///
    /// Every transaction touching both tables takes the node lock first, the
    /// same order [`NodeRepo::sweep_stale`] and [`NodeRepo::try_occupy`] use.
    pub async fn lock(conn: &mut PgConnection, node_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT id FROM nodes WHERE id = $1 FOR UPDATE")
            .bind(node_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Return a `running` node to `idle` unless it still holds a processing issue.
    pub async fn release(conn: &mut PgConnection, node_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE nodes SET status_id = $2 \
             WHERE id = $1 AND status_id = $3 \
               AND NOT EXISTS (SELECT 1 FROM issues WHERE assigned_node_id = $1 AND status_id = $4)",
        )
        .bind(node_id)
        .bind(NodeStatus::Idle.id())
        .bind(NodeStatus::Running.id())
        .bind(IssueStatus::Processing.id())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Explain why [`NodeRepo::try_occupy`] refused a node.
    pub async fn explain_unavailable(
        pool: &PgPool,
        node_id: DbId,
        liveness_timeout: Duration,
    ) -> Result<CoreError, sqlx::Error> {
        let Some(node) = Self::find_by_id(pool, node_id).await? else {
            return Ok(CoreError::NotFound {
                entity: "node",
                id: node_id,
            });
        };
        let stale = is_stale(
            node.last_heartbeat,
            chrono::Utc::now(),
            liveness_timeout,
        );
        let reason = match node.status {
            NodeStatus::Running => format!("Node {node_id} is already running an issue"),
            NodeStatus::Offline => format!("Node {node_id} is offline"),
            NodeStatus::Idle if stale => format!("Node {node_id} has not sent a recent heartbeat"),
            NodeStatus::Idle => format!("Node {node_id} changed state concurrently"),
        };
        Ok(CoreError::Conflict(reason))
    }
}
