//! Registration key row.

use serde::Serialize;
use sqlx::FromRow;
use issuefleet_core::types::{DbId, Timestamp};

/// A row from the `registration_keys` table.
///
/// `key_value` is only retained while the key is active.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegistrationKey {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub key_value: Option<String>,
    pub key_hash: String,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl RegistrationKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}
