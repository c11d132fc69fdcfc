//! Issue entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use issuefleet_core::status::{IssueStatus, Priority};
use issuefleet_core::types::{DbId, Timestamp};

/// A row from the `issues` table, with its dependency ids aggregated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Issue {
    pub id: DbId,
    pub owner_id: DbId,
    pub project_id: Option<DbId>,
    pub title: String,
    pub description: Option<String>,
    pub repository_url: Option<String>,
    pub issue_number: Option<i32>,
    #[sqlx(rename = "status_id")]
    pub status: IssueStatus,
    pub priority: Priority,
    pub assigned_node_id: Option<DbId>,
    pub dependency_issue_ids: Vec<DbId>,
    pub error_message: Option<String>,
    pub result_branch: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// DTO for creating an issue. New issues always start `pending` and
/// unassigned; `status` / `assigned_node_id` are only accepted with those values.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIssue {
    pub title: String,
    pub description: Option<String>,
    pub repository_url: Option<String>,
    pub issue_number: Option<i32>,
    pub priority: Option<Priority>,
    pub project_id: Option<DbId>,
    pub dependency_issue_ids: Option<Vec<DbId>>,
    pub status: Option<IssueStatus>,
    pub assigned_node_id: Option<DbId>,
}

/// DTO for editing an issue. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub repository_url: Option<String>,
    pub issue_number: Option<i32>,
    pub priority: Option<Priority>,
    pub project_id: Option<DbId>,
    pub dependency_issue_ids: Option<Vec<DbId>>,
    pub status: Option<IssueStatus>,
    pub assigned_node_id: Option<DbId>,
}

/// Filters for listing issues.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFilter {
    pub owner_id: Option<DbId>,
    pub status: Option<IssueStatus>,
    pub project_id: Option<DbId>,
    pub assigned_node_id: Option<DbId>,
}
