//! Prompt entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use issuefleet_core::types::{DbId, Timestamp};

/// A row from the `prompts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Prompt {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrompt {
    pub name: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrompt {
    pub name: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}
