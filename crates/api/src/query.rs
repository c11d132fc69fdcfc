//! Shared query parameter types for API handlers.

use issuefleet_core::credential::CredentialCategory;
use issuefleet_core::status::IssueStatus;
use issuefleet_core::types::DbId;
use serde::Deserialize;

/// `?status=&project_id=&assigned_node_id=` for `GET /issues`.
///
/// `project_id` falls back to the request context's project.
#[derive(Debug, Default, Deserialize)]
pub struct IssueListParams {
    pub status: Option<IssueStatus>,
    pub project_id: Option<DbId>,
    pub assigned_node_id: Option<DbId>,
}

/// `?node_id=&category=` for the dispatch endpoints.
///
/// Without `node_id`, `GET /issues/pending/next` is a read-only preview.
#[derive(Debug, Deserialize)]
pub struct DispatchParams {
    pub node_id: Option<DbId>,
    pub category: Option<CredentialCategory>,
}

/// `?node_id=&commit_message=` for `POST /issues/{id}/commit-push`.
#[derive(Debug, Deserialize)]
pub struct CommitPushParams {
    pub node_id: DbId,
    pub commit_message: Option<String>,
}

/// `?category=` for `GET /nodes/{id}/credential`.
#[derive(Debug, Deserialize)]
pub struct CategoryParams {
    pub category: CredentialCategory,
}
