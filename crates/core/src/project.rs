//! Project and prompt field rules, including repository URL normalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum repository URLs a project may list.
pub const MAX_REPOSITORY_URLS: usize = 20;

/// Maximum length of a prompt body.
pub const MAX_PROMPT_CONTENT_LEN: usize = 9999;

const MAX_NAME_LEN: usize = 255;
const MAX_PROJECT_DESCRIPTION_LEN: usize = 999;
const MAX_URL_LEN: usize = 2048;

/// `https://host/path` or scp-style `git@host:owner/repo(.git)`.
static REPOSITORY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://[A-Za-z0-9.-]+(?::\d+)?(?:/[^\s]*)?|git@[A-Za-z0-9.-]+:[A-Za-z0-9._~/-]+)$")
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// Repository URLs
// ---------------------------------------------------------------------------

/// Validate a single repository URL.
pub fn validate_repository_url(url: &str) -> Result<(), CoreError> {
    if url.len() > MAX_URL_LEN || !REPOSITORY_URL_RE.is_match(url) {
        return Err(CoreError::Validation(format!(
            "Invalid repository URL: \"{url}\""
        )));
    }
    Ok(())
}

/// Trim, drop blanks, deduplicate (keeping first occurrence), and validate.
pub fn normalize_repository_urls(urls: &[String]) -> Result<Vec<String>, CoreError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim();
        if url.is_empty() || !seen.insert(url.to_string()) {
            continue;
        }
        validate_repository_url(url)?;
        normalized.push(url.to_string());
    }
    if normalized.len() > MAX_REPOSITORY_URLS {
        return Err(CoreError::Validation(format!(
            "A project may list at most {MAX_REPOSITORY_URLS} repository URLs"
        )));
    }
    Ok(normalized)
}

// ---------------------------------------------------------------------------
// Names and bodies
// ---------------------------------------------------------------------------

fn validate_name(kind: &str, name: &str) -> Result<(), CoreError> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "{kind} name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_project(name: &str, description: Option<&str>) -> Result<(), CoreError> {
    validate_name("Project", name)?;
    if description.is_some_and(|d| d.chars().count() > MAX_PROJECT_DESCRIPTION_LEN) {
        return Err(CoreError::Validation(format!(
            "Project description must not exceed {MAX_PROJECT_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_prompt(name: &str, content: &str, tags: &[String]) -> Result<(), CoreError> {
    validate_name("Prompt", name)?;
    if content.chars().count() > MAX_PROMPT_CONTENT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt content must not exceed {MAX_PROMPT_CONTENT_LEN} characters"
        )));
    }
    crate::node_pool::validate_tags(tags)
}
