pub mod credentials;
pub mod dashboard;
pub mod issues;
pub mod nodes;
pub mod projects;
pub mod prompts;
pub mod webhooks;
