//! Registration key generation, hashing, and the node-agent launch command.
//!
//! Nodes self-register by presenting the current shared registration key.
//! Only the SHA-256 hash is used for lookups; the plaintext is kept while the
//! key is active so an administrator can display it again.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a generated registration key (alphanumeric characters).
pub const KEY_LENGTH: usize = 48;

/// Shortest key accepted when an operator seeds one through configuration.
pub const MIN_SEEDED_KEY_LENGTH: usize = 16;

/// Port the node agent listens on inside its container.
pub const DEFAULT_NODE_AGENT_PORT: u16 = 8007;

/// Container name used in the generated `docker run` command.
const AGENT_CONTAINER_NAME: &str = "issuefleet-node";

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// A freshly generated registration key.
pub struct GeneratedRegistrationKey {
    pub plaintext: String,
    /// SHA-256 hex digest of `plaintext`.
    pub hash: String,
}

/// Generate a new random registration key.
pub fn generate_registration_key() -> GeneratedRegistrationKey {
    let key: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect();

    let hash = hash_registration_key(&key);
    GeneratedRegistrationKey {
        plaintext: key,
        hash,
    }
}

/// Compute the SHA-256 hex digest of a registration key.
pub fn hash_registration_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    format!("{hash:x}")
}

/// Validate a key supplied through configuration before it is stored.
pub fn validate_seeded_key(key: &str) -> Result<(), CoreError> {
    if key.len() < MIN_SEEDED_KEY_LENGTH {
        return Err(CoreError::Validation(format!(
            "Registration key must be at least {MIN_SEEDED_KEY_LENGTH} characters"
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::Validation(
            "Registration key must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Agent launch command
// ---------------------------------------------------------------------------

/// Build the `docker run` command an operator pastes on a new node.
pub fn docker_command(server_url: &str, image: &str, agent_port: u16, key: &str) -> String {
    let server_url = server_url.trim_end_matches('/');
    format!(
        "docker run -d --name {AGENT_CONTAINER_NAME} --restart unless-stopped \
         -p {agent_port}:{agent_port} \
         -v /workspace:/workspace \
         -e SERVER_URL={server_url} \
         -e REGISTRATION_KEY={key} \
         -e AGENT_PORT={agent_port} \
         {image}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_expected_shape() {
        let key = generate_registration_key();
        assert_eq!(key.plaintext.len(), KEY_LENGTH);
        assert!(key.plaintext.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(key.hash, hash_registration_key(&key.plaintext));
        assert_eq!(key.hash.len(), 64);
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(
            generate_registration_key().plaintext,
            generate_registration_key().plaintext
        );
    }

    #[test]
    fn hash_of_known_input() {
        assert_eq!(
            hash_registration_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn seeded_key_rules() {
        assert!(validate_seeded_key("short").is_err());
        assert!(validate_seeded_key("has spaces in the key!!").is_err());
        assert!(validate_seeded_key("a-perfectly-fine-key-123").is_ok());
    }

    #[test]
    fn docker_command_embeds_server_and_key() {
        let cmd = docker_command(
            "https://fleet.example.com/",
            "issuefleet/node-agent:latest",
            8007,
            "abc123",
        );
        assert!(cmd.starts_with("docker run -d"));
        assert!(cmd.contains("-e SERVER_URL=https://fleet.example.com "));
        assert!(cmd.contains("-e REGISTRATION_KEY=abc123"));
        assert!(cmd.contains("-p 8007:8007"));
        assert!(cmd.ends_with("issuefleet/node-agent:latest"));
    }
}
