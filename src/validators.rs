//! Input validators for account fields.
//!
//! Length limits keep oversized payloads out of the database; content checks
//! reject control characters and null bytes.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_USERNAME_LENGTH: usize = 30;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_FULLNAME_LENGTH: usize = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // Usernames are stored lowercased; letters, digits, underscores only.
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9_]+$").unwrap();
}

/// Validates an email address: format, length, single @ sign.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort(
            "email".to_string(),
            MIN_EMAIL_LENGTH,
        ));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong(
            "email".to_string(),
            MAX_EMAIL_LENGTH,
        ));
    }

    if trimmed.matches('@').count() != 1 || !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(
            "email has invalid format".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates a username and normalizes it to lowercase.
///
/// Usernames are part of public channel URLs, so the accepted alphabet is
/// deliberately narrow.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let normalized = username.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if normalized.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort(
            "username".to_string(),
            MIN_USERNAME_LENGTH,
        ));
    }

    if normalized.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong(
            "username".to_string(),
            MAX_USERNAME_LENGTH,
        ));
    }

    if !USERNAME_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat(
            "username may only contain letters, digits, and underscores".to_string(),
        ));
    }

    Ok(normalized)
}

/// Validates a display name: non-empty, bounded, no control characters.
pub fn is_valid_fullname(fullname: &str) -> Result<String, ValidationError> {
    let trimmed = fullname.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("fullname".to_string()));
    }

    if trimmed.len() > MAX_FULLNAME_LENGTH {
        return Err(ValidationError::TooLong(
            "fullname".to_string(),
            MAX_FULLNAME_LENGTH,
        ));
    }

    if trimmed.contains('\0') || trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("fullname".to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());

        assert!(is_valid_email("a@a").is_err()); // Too short
    }

    #[test]
    fn test_valid_username() {
        assert_eq!(is_valid_username("demo_user1").unwrap(), "demo_user1");
        assert_eq!(is_valid_username("Demo_User1").unwrap(), "demo_user1");
    }

    #[test]
    fn test_username_rejects_bad_characters() {
        assert!(is_valid_username("user name").is_err());
        assert!(is_valid_username("user@name").is_err());
        assert!(is_valid_username("user-name").is_err());
    }

    #[test]
    fn test_username_length_limits() {
        assert!(is_valid_username("ab").is_err());
        assert!(is_valid_username(&"a".repeat(31)).is_err());
        assert!(is_valid_username(&"a".repeat(30)).is_ok());
    }

    #[test]
    fn test_valid_fullname() {
        assert!(is_valid_fullname("Demo User One").is_ok());
        assert!(is_valid_fullname("Jean-Pierre O'Brien").is_ok());
    }

    #[test]
    fn test_fullname_rejects_control_characters() {
        assert!(is_valid_fullname("Name\0with\0null").is_err());
        assert!(is_valid_fullname("Name\twith\ttabs").is_err());
    }

    #[test]
    fn test_fullname_length_limits() {
        assert!(is_valid_fullname("").is_err());
        assert!(is_valid_fullname(&"a".repeat(101)).is_err());
    }
}
