//! Repository for the `registration_keys` table.

use issuefleet_core::error::CoreError;
use issuefleet_core::registration_key::{
    generate_registration_key, hash_registration_key, validate_seeded_key,
};
use sqlx::{PgConnection, PgPool};

use crate::error::RepoError;
use crate::models::registration_key::RegistrationKey;

/// Column list for `registration_keys` queries.
const COLUMNS: &str = "id, key_value, key_hash, created_at, revoked_at";

/// Issues, rotates, and verifies the shared node registration key.
pub struct RegistrationKeyRepo;

impl RegistrationKeyRepo {
    /// The currently active key, if one has been issued.
    pub async fn find_active(pool: &PgPool) -> Result<Option<RegistrationKey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM registration_keys WHERE revoked_at IS NULL");
        sqlx::query_as::<_, RegistrationKey>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Return the active key, issuing one on first use.
    ///
    /// `seed` (from configuration) is used as the first key when present and
    /// not previously revoked; otherwise a random key is generated.
    pub async fn ensure_active(
        pool: &PgPool,
        seed: Option<&str>,
    ) -> Result<RegistrationKey, RepoError> {
        if let Some(active) = Self::find_active(pool).await? {
            return Ok(active);
        }

        if let Some(seed) = seed {
            validate_seeded_key(seed)?;
            Self::insert_if_none_active(pool, seed).await?;
            if let Some(active) = Self::find_active(pool).await? {
                return Ok(active);
            }
            tracing::warn!("Configured registration key was previously revoked; generating a new one");
        }

        let generated = generate_registration_key();
        Self::insert_if_none_active(pool, &generated.plaintext).await?;
        Self::find_active(pool)
            .await?
            .ok_or_else(|| CoreError::Internal("No active registration key after insert".into()).into())
    }

    /// Revoke the active key and issue a new one in a single transaction.
    ///
    /// Registrations verifying the old key hold a `FOR SHARE` lock on its row,
    /// so rotation waits for them and every later attempt sees it revoked.
    pub async fn rotate(pool: &PgPool) -> Result<RegistrationKey, sqlx::Error> {
        let generated = generate_registration_key();

        let mut tx = pool.begin().await?;
        sqlx::query(
            "UPDATE registration_keys SET revoked_at = NOW(), key_value = NULL \
             WHERE revoked_at IS NULL",
        )
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO registration_keys (key_value, key_hash) VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        let key = sqlx::query_as::<_, RegistrationKey>(&query)
            .bind(&generated.plaintext)
            .bind(&generated.hash)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(key_id = key.id, "Registration key rotated");
        Ok(key)
    }

    /// Verify a presented key inside the caller's transaction.
    ///
    /// Locks the matching row `FOR SHARE` until the transaction ends.
    pub async fn verify(
        conn: &mut PgConnection,
        presented: &str,
    ) -> Result<RegistrationKey, RepoError> {
        let query = format!(
            "SELECT {COLUMNS} FROM registration_keys WHERE key_hash = $1 FOR SHARE"
        );
        let key = sqlx::query_as::<_, RegistrationKey>(&query)
            .bind(hash_registration_key(presented))
            .fetch_optional(&mut *conn)
            .await?;

        match key {
            None => Err(CoreError::InvalidRegistrationKey.into()),
            Some(key) if !key.is_active() => Err(CoreError::ExpiredKey.into()),
            Some(key) => Ok(key),
        }
    }

    async fn insert_if_none_active(pool: &PgPool, plaintext: &str) -> Result<(), sqlx::Error> {
        // Either unique index (one active key, distinct hashes) turns this into a no-op.
        sqlx::query(
            "INSERT INTO registration_keys (key_value, key_hash) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(plaintext)
        .bind(hash_registration_key(plaintext))
        .execute(pool)
        .await?;
        Ok(())
    }
}
