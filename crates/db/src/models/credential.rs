//! Credential entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use issuefleet_core::credential::{mask_secret, CredentialCategory, CredentialSecrets};
use issuefleet_core::types::{DbId, Timestamp};

/// A row from the `credentials` table with its bound node ids.
///
/// Serializing this struct exposes the secrets; API listings use
/// [`MaskedCredential`] instead.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Credential {
    pub id: DbId,
    pub owner_id: DbId,
    pub title: String,
    #[sqlx(rename = "category_id")]
    pub category: CredentialCategory,
    pub description: Option<String>,
    pub pat: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub service: Option<String>,
    pub is_disabled: bool,
    pub node_ids: Vec<DbId>,
    pub last_used_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Credential {
    pub fn secrets(&self) -> CredentialSecrets {
        CredentialSecrets {
            pat: self.pat.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            service: self.service.clone(),
        }
    }
}

/// Credential with `pat` and `password` masked to their last 4 characters.
#[derive(Debug, Clone, Serialize)]
pub struct MaskedCredential {
    pub id: DbId,
    pub owner_id: DbId,
    pub title: String,
    pub category: CredentialCategory,
    pub description: Option<String>,
    pub pat: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub service: Option<String>,
    pub is_disabled: bool,
    pub node_ids: Vec<DbId>,
    pub last_used_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Credential> for MaskedCredential {
    fn from(c: Credential) -> Self {
        Self {
            id: c.id,
            owner_id: c.owner_id,
            title: c.title,
            category: c.category,
            description: c.description,
            pat: c.pat.as_deref().map(mask_secret),
            username: c.username,
            password: c.password.as_deref().map(mask_secret),
            service: c.service,
            is_disabled: c.is_disabled,
            node_ids: c.node_ids,
            last_used_at: c.last_used_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCredential {
    pub title: String,
    pub category: CredentialCategory,
    pub description: Option<String>,
    pub pat: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub service: Option<String>,
    pub is_disabled: Option<bool>,
    pub node_ids: Option<Vec<DbId>>,
}

impl CreateCredential {
    pub fn secrets(&self) -> CredentialSecrets {
        CredentialSecrets {
            pat: self.pat.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            service: self.service.clone(),
        }
    }
}

/// DTO for updating a credential. `node_ids`, when present, replaces the
/// whole binding set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCredential {
    pub title: Option<String>,
    pub category: Option<CredentialCategory>,
    pub description: Option<String>,
    pub pat: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub service: Option<String>,
    pub is_disabled: Option<bool>,
    pub node_ids: Option<Vec<DbId>>,
}
