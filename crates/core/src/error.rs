use crate::status::IssueStatus;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Issue {issue_id} was already claimed by another node")]
    AlreadyClaimed { issue_id: DbId },

    #[error("Adding dependency {dependency_id} to issue {issue_id} would create a cycle")]
    CyclicDependency { issue_id: DbId, dependency_id: DbId },

    #[error("Issue {issue_id} is a dependency of issues {dependents:?}")]
    DependencyInUse {
        issue_id: DbId,
        dependents: Vec<DbId>,
    },

    #[error("Cannot {action} an issue in status {from}")]
    InvalidTransition {
        from: IssueStatus,
        action: &'static str,
    },

    #[error("Invalid registration key")]
    InvalidRegistrationKey,

    #[error("Registration key has been rotated")]
    ExpiredKey,

    #[error("No eligible pending issue")]
    NoWorkAvailable,

    #[error("No enabled {category} credential is bound to node {node_id}")]
    NoCredentialAvailable { node_id: DbId, category: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
