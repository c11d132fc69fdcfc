//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` (or a `&mut PgConnection` borrowed from the caller's
//! transaction) as the first argument.

pub mod credential_repo;
pub mod dashboard_repo;
pub mod issue_repo;
pub mod node_repo;
pub mod project_repo;
pub mod prompt_repo;
pub mod registration_key_repo;

pub use credential_repo::CredentialRepo;
pub use dashboard_repo::DashboardRepo;
pub use issue_repo::IssueRepo;
pub use node_repo::NodeRepo;
pub use project_repo::ProjectRepo;
pub use prompt_repo::PromptRepo;
pub use registration_key_repo::RegistrationKeyRepo;
