//! Repository for the `prompts` table.

use issuefleet_core::types::DbId;
use sqlx::PgPool;

use crate::models::prompt::{CreatePrompt, Prompt, UpdatePrompt};

/// Column list for `prompts` queries.
const COLUMNS: &str = "id, owner_id, name, content, tags, created_at, updated_at";

/// Provides CRUD operations for prompts.
pub struct PromptRepo;

impl PromptRepo {
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreatePrompt,
    ) -> Result<Prompt, sqlx::Error> {
        let query = format!(
            "INSERT INTO prompts (owner_id, name, content, tags) \
             VALUES ($1, $2, $3, COALESCE($4::text[], '{{}}')) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(owner_id)
            .bind(input.name.trim())
            .bind(&input.content)
            .bind(&input.tags)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Prompt>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM prompts WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Prompt>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, owner_id: DbId) -> Result<Vec<Prompt>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM prompts WHERE owner_id = $1 ORDER BY name ASC, id ASC"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
        input: &UpdatePrompt,
    ) -> Result<Option<Prompt>, sqlx::Error> {
        let query = format!(
            "UPDATE prompts SET
                name = COALESCE($2, name),
                content = COALESCE($3, content),
                tags = COALESCE($4::text[], tags)
             WHERE id = $1 AND owner_id = $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Prompt>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.content)
            .bind(&input.tags)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prompts WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
