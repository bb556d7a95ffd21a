//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating UUIDs (v4 format)
    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"
    ).unwrap();

    /// Pragmatic email shape check; deliverability is the mail server's problem
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if !UUID_REGEX.is_match(&id.to_lowercase()) {
        return Err(format!("{} must be a valid UUID", field_name));
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate password strength.
/// Returns None if valid, or Some(error_message) if invalid
pub fn validate_password_strength(password: &str) -> Option<String> {
    if password.len() < 8 {
        return Some("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Some("Password is too long (max 128 characters)".to_string());
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_letter || !has_digit {
        return Some("Password must contain at least one letter and one digit".to_string());
    }

    None
}

/// Validate a display name (org, project, task title)
pub fn validate_name(name: &str, field_name: &str, max_len: usize) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if name.len() > max_len {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, max_len
        ));
    }

    Ok(())
}

/// Generate a URL-friendly slug from a name
pub fn generate_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_validation() {
        assert!(validate_uuid(&uuid::Uuid::new_v4().to_string(), "id").is_ok());
        assert!(validate_uuid("", "id").is_err());
        assert!(validate_uuid("not-a-uuid", "id").is_err());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("first.last@example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@signs.com").is_err());
    }

    #[test]
    fn password_strength() {
        assert!(validate_password_strength("hunter42x").is_none());
        assert!(validate_password_strength("short1").is_some());
        assert!(validate_password_strength("alllettersonly").is_some());
        assert!(validate_password_strength("12345678").is_some());
    }

    #[test]
    fn slug_generation() {
        assert_eq!(generate_slug("Acme Corp"), "acme-corp");
        assert_eq!(generate_slug("  Spaced  Out  "), "spaced-out");
        assert_eq!(generate_slug("Weird!!Chars##Here"), "weird-chars-here");
    }
}
