//! Node entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use issuefleet_core::status::NodeStatus;
use issuefleet_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity structs (match database tables)
// ---------------------------------------------------------------------------

/// A row from the `nodes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Node {
    pub id: DbId,
    pub name: String,
    pub ip: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    #[sqlx(rename = "status_id")]
    pub status: NodeStatus,
    pub last_heartbeat: Option<Timestamp>,
    #[serde(skip_serializing)]
    pub registration_key_hash: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(skip_serializing)]
    pub deleted_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Create / Update DTOs
// ---------------------------------------------------------------------------

/// DTO for an administrator-created node. Starts `offline` until it heartbeats.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNode {
    pub name: String,
    pub ip: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// DTO for updating a node. `status` and `last_heartbeat` are accepted so a
/// client can echo a full payload back, but must match the stored values.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNode {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<NodeStatus>,
    pub last_heartbeat: Option<Timestamp>,
}

/// Self-registration request sent by a node agent.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterNode {
    pub registration_key: String,
    pub name: String,
    pub ip: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Liveness report sent by a node agent.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeHeartbeat {
    pub node_id: DbId,
    pub status: NodeStatus,
    pub timestamp: Option<Timestamp>,
}

/// Result of one offline sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub offline_node_ids: Vec<DbId>,
    pub terminated_issue_ids: Vec<DbId>,
}
