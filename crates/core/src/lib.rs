//! Domain logic for the issue dispatch engine.
//!
//! Everything in this crate is pure: no database, no HTTP. The `db` and `api`
//! crates call into it to validate input and decide state transitions.

pub mod command;
pub mod credential;
pub mod dependency_graph;
pub mod error;
pub mod issue;
pub mod lifecycle;
pub mod node_pool;
pub mod project;
pub mod queue;
pub mod registration_key;
pub mod status;
pub mod types;
pub mod workspace;
