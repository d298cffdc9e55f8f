/// Field validators used by request DTOs through `#[validate(custom(...))]`
use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::models::PostStatus;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,50}$").expect("Invalid username regex"));

pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 30;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Usernames are 3-50 ASCII letters, digits or underscores
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(invalid(
            "username",
            "username must be 3-50 letters, digits or underscores",
        ))
    }
}

/// Clients may only create drafts or publish directly
pub fn validate_post_status(status: &PostStatus) -> Result<(), ValidationError> {
    match status {
        PostStatus::Draft | PostStatus::Published => Ok(()),
        _ => Err(invalid("status", "status must be draft or published")),
    }
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(invalid("tags", "at most 10 tags are allowed"));
    }
    if tags.iter().any(|t| t.chars().count() > MAX_TAG_CHARS) {
        return Err(invalid("tags", "each tag must be at most 30 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_charset_and_length() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("user_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has-dash").is_err());
        assert!(validate_username("中文名字").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_client_settable_statuses() {
        assert!(validate_post_status(&PostStatus::Draft).is_ok());
        assert!(validate_post_status(&PostStatus::Published).is_ok());
        assert!(validate_post_status(&PostStatus::Deleted).is_err());
        assert!(validate_post_status(&PostStatus::Archived).is_err());
    }

    #[test]
    fn test_tags_limits() {
        let ok: Vec<String> = (0..10).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&ok).is_ok());

        let too_many: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&too_many).is_err());

        assert!(validate_tags(&["情".repeat(30)]).is_ok());
        assert!(validate_tags(&["情".repeat(31)]).is_err());
    }
}
