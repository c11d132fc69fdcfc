//! Credential field rules and secret masking.

use crate::error::CoreError;
pub use crate::status::CredentialCategory;

const MAX_TITLE_LEN: usize = 255;
const MAX_FIELD_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_PAT_LEN: usize = 1024;

/// Number of trailing characters left visible by [`mask_secret`].
pub const VISIBLE_SECRET_CHARS: usize = 4;

impl CredentialCategory {
    /// Whether the category authenticates with a personal access token.
    pub fn requires_pat(self) -> bool {
        match self {
            CredentialCategory::GithubCopilot
            | CredentialCategory::Cursor
            | CredentialCategory::ClaudeCode => true,
            CredentialCategory::Generic => false,
        }
    }
}

/// Secret-bearing fields of a credential, as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSecrets {
    pub pat: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub service: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn check_len(field: &str, value: &Option<String>, max: usize) -> Result<(), CoreError> {
    match value {
        Some(v) if v.chars().count() > max => Err(CoreError::Validation(format!(
            "{field} must not exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Validate the secret fields against the category's requirements.
pub fn validate_secrets(
    category: CredentialCategory,
    secrets: &CredentialSecrets,
) -> Result<(), CoreError> {
    check_len("pat", &secrets.pat, MAX_PAT_LEN)?;
    check_len("username", &secrets.username, MAX_FIELD_LEN)?;
    check_len("password", &secrets.password, MAX_FIELD_LEN)?;
    check_len("service", &secrets.service, MAX_FIELD_LEN)?;

    if category.requires_pat() {
        if !present(&secrets.pat) {
            return Err(CoreError::Validation(format!(
                "A {category} credential requires a pat"
            )));
        }
        return Ok(());
    }

    let missing: Vec<&str> = [
        ("username", &secrets.username),
        ("password", &secrets.password),
        ("service", &secrets.service),
    ]
    .into_iter()
    .filter(|(_, v)| !present(v))
    .map(|(name, _)| name)
    .collect();
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!(
            "A generic credential requires {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Validate a credential title and description.
pub fn validate_credential_text(title: &str, description: Option<&str>) -> Result<(), CoreError> {
    let title_len = title.trim().chars().count();
    if title_len == 0 || title_len > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Credential title must be 1-{MAX_TITLE_LEN} characters"
        )));
    }
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(CoreError::Validation(format!(
            "Credential description must not exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

/// Replace all but the last [`VISIBLE_SECRET_CHARS`] characters with `*`.
///
/// Secrets no longer than the visible suffix are masked entirely.
pub fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= VISIBLE_SECRET_CHARS {
        return "*".repeat(len);
    }
    let hidden = len - VISIBLE_SECRET_CHARS;
    let mut masked = "*".repeat(hidden);
    masked.extend(secret.chars().skip(hidden));
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(value: &str) -> CredentialSecrets {
        CredentialSecrets {
            pat: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn coding_agents_require_pat() {
        for category in [
            CredentialCategory::GithubCopilot,
            CredentialCategory::Cursor,
            CredentialCategory::ClaudeCode,
        ] {
            assert!(category.requires_pat());
            assert!(validate_secrets(category, &pat("ghp_123")).is_ok());
            assert!(validate_secrets(category, &CredentialSecrets::default()).is_err());
            assert!(validate_secrets(category, &pat("   ")).is_err());
        }
    }

    #[test]
    fn generic_requires_all_three_fields() {
        let full = CredentialSecrets {
            username: Some("bot".into()),
            password: Some("hunter2".into()),
            service: Some("jira".into()),
            pat: None,
        };
        assert!(validate_secrets(CredentialCategory::Generic, &full).is_ok());

        let partial = CredentialSecrets {
            password: None,
            service: None,
            ..full
        };
        let err = validate_secrets(CredentialCategory::Generic, &partial).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: A generic credential requires password, service"
        );
    }

    #[test]
    fn overlong_fields_rejected() {
        let secrets = pat(&"x".repeat(MAX_PAT_LEN + 1));
        assert!(validate_secrets(CredentialCategory::Cursor, &secrets).is_err());
    }

    #[test]
    fn title_rules() {
        assert!(validate_credential_text("Copilot token", None).is_ok());
        assert!(validate_credential_text("  ", None).is_err());
        assert!(validate_credential_text("ok", Some(&"d".repeat(501))).is_err());
    }

    #[test]
    fn masking_keeps_last_four() {
        assert_eq!(mask_secret("ghp_abcdef1234"), "**********1234");
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn masking_counts_characters_not_bytes() {
        assert_eq!(mask_secret("пароль1234"), "******1234");
    }
}
