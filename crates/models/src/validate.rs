//! Field rules shared by every storage backend.

use crate::errors::ModelError;

pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 150;
pub const EMAIL_MAX: usize = 254;
pub const TEXT_MAX: usize = 200;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_BLANK: &str = "This field may not be blank.";
pub const MSG_INVALID_EMAIL: &str = "Enter a valid email address.";
pub const MSG_INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::Validation(msg.into())
}

/// Non-blank and at most `max` characters (not bytes).
pub fn text(value: &str, max: usize) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(invalid(MSG_BLANK));
    }
    if value.chars().count() > max {
        return Err(invalid(too_long(max)));
    }
    Ok(())
}

/// Blank allowed, at most `max` characters.
pub fn optional_text(value: &str, max: usize) -> Result<(), ModelError> {
    if value.chars().count() > max {
        return Err(invalid(too_long(max)));
    }
    Ok(())
}

/// Letters, digits and `_ . @ + -`, up to 150 characters.
pub fn username(value: &str) -> Result<(), ModelError> {
    text(value, USERNAME_MAX)?;
    let ok = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !ok {
        return Err(invalid(MSG_INVALID_USERNAME));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(invalid(MSG_BLANK));
    }
    if value.chars().count() > EMAIL_MAX {
        return Err(invalid(too_long(EMAIL_MAX)));
    }
    let Some((local, domain)) = value.rsplit_once('@') else {
        return Err(invalid(MSG_INVALID_EMAIL));
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok || value.chars().any(char::is_whitespace) {
        return Err(invalid(MSG_INVALID_EMAIL));
    }
    Ok(())
}

/// Canonical stored form of an email address.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(username("alice.b+c@d-e_f").is_ok());
        assert!(username("żółw").is_ok());
        assert_eq!(username("").unwrap_err().message(), MSG_BLANK);
        assert_eq!(username("has space").unwrap_err().message(), MSG_INVALID_USERNAME);
        assert_eq!(username(&"a".repeat(151)).unwrap_err().message(), too_long(150));
        assert!(username(&"a".repeat(150)).is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(email("a@example.com").is_ok());
        assert!(email("a@localhost").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("a b@example.com").is_err());
        assert!(email("a@example..com").is_err());
        assert_eq!(normalize_email(" Bob@Example.COM "), "bob@example.com");
    }

    #[test]
    fn text_counts_chars_not_bytes() {
        assert!(text(&"é".repeat(200), TEXT_MAX).is_ok());
        assert!(text(&"é".repeat(201), TEXT_MAX).is_err());
        assert!(text("   ", TEXT_MAX).is_err());
        assert!(optional_text("", NAME_MAX).is_ok());
    }
}
