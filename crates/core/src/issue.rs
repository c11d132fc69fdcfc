//! Issue field validation.

use crate::error::CoreError;
use crate::project::validate_repository_url;

const MAX_TITLE_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 20_000;

pub fn validate_issue_title(title: &str) -> Result<(), CoreError> {
    let len = title.trim().chars().count();
    if len == 0 || len > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Issue title must be 1-{MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate the optional descriptive fields of an issue.
pub fn validate_issue_details(
    description: Option<&str>,
    repository_url: Option<&str>,
    issue_number: Option<i32>,
) -> Result<(), CoreError> {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(CoreError::Validation(format!(
            "Issue description must not exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if let Some(url) = repository_url {
        validate_repository_url(url)?;
    }
    if issue_number.is_some_and(|n| n <= 0) {
        return Err(CoreError::Validation(
            "issue_number must be positive".to_string(),
        ));
    }
    Ok(())
}
