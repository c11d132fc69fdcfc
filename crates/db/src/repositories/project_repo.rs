//! Repository for the `projects` table.

use issuefleet_core::types::DbId;
use sqlx::PgPool;

use crate::models::project::{CreateProject, Project, UpdateProject};

/// Column list for `projects` queries.
const COLUMNS: &str = "id, owner_id, name, description, repository_urls, created_at, updated_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a project. `repository_urls` must already be normalized.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateProject,
        repository_urls: &[String],
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (owner_id, name, description, repository_urls) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(owner_id)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(repository_urls)
            .fetch_one(pool)
            .await
    }

    /// Fetch one of `owner_id`'s projects.
    pub async fn find_by_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, owner_id: DbId) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects WHERE owner_id = $1 ORDER BY name ASC, id ASC"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Update a project. `repository_urls`, when given, replaces the list.
    pub async fn update(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
        input: &UpdateProject,
        repository_urls: Option<&[String]>,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                repository_urls = COALESCE($4::text[], repository_urls)
             WHERE id = $1 AND owner_id = $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(repository_urls)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a project; its issues are detached (`project_id` set to NULL).
    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
