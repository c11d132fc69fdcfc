//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod credential;
pub mod dashboard;
pub mod issue;
pub mod node;
pub mod project;
pub mod prompt;
pub mod registration_key;
