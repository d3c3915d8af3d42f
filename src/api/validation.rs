//! Input validation for API requests.
//!
//! Validation functions for request data, ensuring inputs meet the required
//! format and constraints. For collecting multiple validation errors and
//! returning them as an ApiError, use the `ValidationErrorBuilder` from the
//! `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating email addresses (pragmatic, not RFC-complete)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();

    /// Regex for validating course codes (e.g. CS101, MATH-2410)
    static ref COURSE_CODE_REGEX: Regex = Regex::new(
        r"^[A-Z]{2,6}-?[0-9]{2,4}$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a user's display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() < 2 {
        return Err("Name is too short (min 2 characters)".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate a password at registration
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a course code
pub fn validate_course_code(code: &str) -> Result<(), String> {
    if code.is_empty() {
        return Err("Course code is required".to_string());
    }

    if !COURSE_CODE_REGEX.is_match(code) {
        return Err(
            "Invalid course code. Expected letters followed by digits, e.g. CS101".to_string(),
        );
    }

    Ok(())
}

/// Validate a course or material title
pub fn validate_title(title: &str) -> Result<(), String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title is required".to_string());
    }

    if title.len() > 200 {
        return Err("Title is too long (max 200 characters)".to_string());
    }

    Ok(())
}

/// Validate a free-text description
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.len() > 2000 {
        return Err("Description is too long (max 2000 characters)".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| format!("{} must be a valid UUID", field_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("student@example.com").is_ok());
        assert!(validate_email("first.last+tag@uni.ac.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@domain").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ada Lovelace").is_ok());
        assert!(validate_name("  Bo  ").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());

        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_course_code() {
        assert!(validate_course_code("CS101").is_ok());
        assert!(validate_course_code("DS101").is_ok());
        assert!(validate_course_code("MATH-2410").is_ok());

        assert!(validate_course_code("").is_err());
        assert!(validate_course_code("cs101").is_err());
        assert!(validate_course_code("101CS").is_err());
        assert!(validate_course_code("C1").is_err());
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Week 1: Introduction").is_ok());

        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "course_id").is_ok());
        assert!(validate_uuid("", "course_id").is_err());
        assert!(validate_uuid("not-a-uuid", "course_id").is_err());
    }
}
