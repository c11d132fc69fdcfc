//! Repository for `credentials` and the `credential_nodes` binding table.

use issuefleet_core::credential::CredentialCategory;
use issuefleet_core::error::CoreError;
use issuefleet_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::error::RepoError;
use crate::models::credential::{CreateCredential, Credential, UpdateCredential};
use crate::repositories::NodeRepo;

/// Column list for `credentials` queries, with bound node ids aggregated.
const COLUMNS: &str = "\
    id, owner_id, title, category_id, description, pat, username, password, service, \
    is_disabled, \
    ARRAY(SELECT cn.node_id FROM credential_nodes cn \
          WHERE cn.credential_id = credentials.id ORDER BY cn.node_id) AS node_ids, \
    last_used_at, created_at, updated_at";

/// Provides CRUD and node-binding operations for credentials.
pub struct CredentialRepo;

impl CredentialRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Credential>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM credentials WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Credential>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's credentials ordered by title.
    pub async fn list(pool: &PgPool, owner_id: DbId) -> Result<Vec<Credential>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credentials WHERE owner_id = $1 ORDER BY title ASC, id ASC"
        );
        sqlx::query_as::<_, Credential>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Insert a credential and its node bindings.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateCredential,
    ) -> Result<Credential, RepoError> {
        let mut tx = pool.begin().await?;
        let id: DbId = sqlx::query_scalar(
            "INSERT INTO credentials \
                (owner_id, title, category_id, description, pat, username, password, service, is_disabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, false)) \
             RETURNING id",
        )
        .bind(owner_id)
        .bind(input.title.trim())
        .bind(input.category.id())
        .bind(&input.description)
        .bind(&input.pat)
        .bind(&input.username)
        .bind(&input.password)
        .bind(&input.service)
        .bind(input.is_disabled)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(node_ids) = &input.node_ids {
            replace_bindings(&mut tx, id, node_ids).await?;
        }
        let credential = fetch_in_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(credential)
    }

    /// Apply non-`None` fields; `node_ids` replaces the binding set.
    pub async fn update(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
        input: &UpdateCredential,
    ) -> Result<Option<Credential>, RepoError> {
        let mut tx = pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE credentials SET
                title = COALESCE($2, title),
                category_id = COALESCE($3, category_id),
                description = COALESCE($4, description),
                pat = COALESCE($5, pat),
                username = COALESCE($6, username),
                password = COALESCE($7, password),
                service = COALESCE($8, service),
                is_disabled = COALESCE($9, is_disabled)
             WHERE id = $1 AND owner_id = $10",
        )
        .bind(id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(input.category.map(CredentialCategory::id))
        .bind(&input.description)
        .bind(&input.pat)
        .bind(&input.username)
        .bind(&input.password)
        .bind(&input.service)
        .bind(input.is_disabled)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(node_ids) = &input.node_ids {
            replace_bindings(&mut tx, id, node_ids).await?;
        }
        let credential = fetch_in_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(credential))
    }

    /// Delete one of `owner_id`'s credentials. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM credentials WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Select the least recently used enabled credential of `category` bound
    /// to `node_id`, stamping `last_used_at` in the same statement.
    ///
    /// Rows locked by a concurrent caller are skipped first, so simultaneous
    /// dispatches to one node rotate through its bound credentials. Only when
    /// every candidate is locked does the call wait for one.
    pub async fn bind_for_node(
        pool: &PgPool,
        node_id: DbId,
        category: CredentialCategory,
    ) -> Result<Credential, RepoError> {
        let picked = match take_least_recently_used(pool, node_id, category, true).await? {
            Some(credential) => Some(credential),
            None => take_least_recently_used(pool, node_id, category, false).await?,
        };
        picked.ok_or_else(|| {
            CoreError::NoCredentialAvailable {
                node_id,
                category: category.to_string(),
            }
            .into()
        })
    }
}

async fn take_least_recently_used(
    pool: &PgPool,
    node_id: DbId,
    category: CredentialCategory,
    skip_locked: bool,
) -> Result<Option<Credential>, sqlx::Error> {
    let lock = if skip_locked {
        "FOR UPDATE OF c SKIP LOCKED"
    } else {
        "FOR UPDATE OF c"
    };
    let query = format!(
        "UPDATE credentials SET last_used_at = NOW() \
         WHERE id = (\
             SELECT c.id FROM credentials c \
             JOIN credential_nodes cn ON cn.credential_id = c.id \
             WHERE cn.node_id = $1 AND c.category_id = $2 AND NOT c.is_disabled \
             ORDER BY c.last_used_at ASC NULLS FIRST, c.id ASC \
             LIMIT 1 \
             {lock}\
         ) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Credential>(&query)
        .bind(node_id)
        .bind(category.id())
        .fetch_optional(pool)
        .await
}

async fn replace_bindings(
    conn: &mut PgConnection,
    credential_id: DbId,
    node_ids: &[DbId],
) -> Result<(), RepoError> {
    let missing = NodeRepo::missing_ids(&mut *conn, node_ids).await?;
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!("Unknown node ids: {missing:?}")).into());
    }

    sqlx::query("DELETE FROM credential_nodes WHERE credential_id = $1")
        .bind(credential_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO credential_nodes (credential_id, node_id) \
         SELECT $1, n FROM UNNEST($2::bigint[]) AS n \
         ON CONFLICT DO NOTHING",
    )
    .bind(credential_id)
    .bind(node_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_in_tx(conn: &mut PgConnection, id: DbId) -> Result<Credential, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM credentials WHERE id = $1");
    sqlx::query_as::<_, Credential>(&query)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}
