//! Common validation rules shared across request payloads.

use validator::ValidationError;

use crate::utils::password::check_strength;

/// Applies the member password policy from `utils::password`.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    check_strength(password).map_err(|weakness| ValidationError::new(weakness.code()))
}

/// Rejects values that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Validates an absolute http(s) URL.
pub fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("url_invalid")),
    }
}

/// Validates a tag list: at most 20 tags, each 1-40 characters.
pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 20 {
        return Err(ValidationError::new("too_many_tags"));
    }
    if tags
        .iter()
        .any(|tag| tag.trim().is_empty() || tag.chars().count() > 40)
    {
        return Err(ValidationError::new("tag_invalid_length"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rejects_short() {
        assert!(validate_password_strength("a1b2").is_err());
    }

    #[test]
    fn password_requires_letter_and_digit() {
        assert!(validate_password_strength("abcdefghij").is_err());
        assert!(validate_password_strength("1234567890").is_err());
    }

    #[test]
    fn password_errors_carry_policy_codes() {
        let err = validate_password_strength("short1").unwrap_err();
        assert_eq!(err.code, "password_invalid_length");
        let err = validate_password_strength("nodigitshere").unwrap_err();
        assert_eq!(err.code, "password_too_weak");
    }

    #[test]
    fn password_accepts_valid() {
        assert!(validate_password_strength("club2026pass").is_ok());
    }

    #[test]
    fn not_blank_rejects_whitespace() {
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank(" x ").is_ok());
    }

    #[test]
    fn http_url_requires_http_scheme() {
        assert!(validate_http_url("https://github.com/club/repo").is_ok());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert!(validate_http_url("not a url").is_err());
    }

    #[test]
    fn tags_rejects_empty_entries() {
        assert!(validate_tags(&["rust".into(), " ".into()]).is_err());
        assert!(validate_tags(&["rust".into(), "web".into()]).is_ok());
    }
}
