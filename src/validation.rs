//! Input validation for request payloads.
//!
//! Every rule here runs in the handler before any storage call, so an invalid
//! payload is rejected without touching the database. Rules are deliberately
//! plain character scans; the messages are part of the API contract and are
//! asserted by the frontend.

use crate::error::ApiError;

/// The special characters a password may (and must, at least once) contain.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*";

const NAME_MIN: usize = 20;
const NAME_MAX: usize = 60;
const ADDRESS_MAX: usize = 400;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 16;

/// require_fields
///
/// Rejects a request when any listed field is empty. The message is shared by
/// design: which field is missing is visible to the caller from their own
/// payload.
pub fn require_fields(fields: &[&str], message: &str) -> Result<(), ApiError> {
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(())
}

/// validate_name
///
/// Registration name policy: 20 to 60 characters inclusive.
pub fn validate_name(name: &str) -> Result<(), ApiError> {
    let length = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&length) {
        return Err(ApiError::BadRequest(
            "Name must be between 20 and 60 characters".to_string(),
        ));
    }
    Ok(())
}

/// validate_address
///
/// Addresses are optional but capped at 400 characters when present.
pub fn validate_address(address: &str) -> Result<(), ApiError> {
    if address.chars().count() > ADDRESS_MAX {
        return Err(ApiError::BadRequest(
            "Address must not exceed 400 characters".to_string(),
        ));
    }
    Ok(())
}

/// validate_password
///
/// Password policy: 8-16 characters, at least one ASCII uppercase letter and
/// at least one character from [`PASSWORD_SPECIALS`], and nothing outside
/// alphanumerics plus that special set. All three failures share one message
/// so the response does not enumerate which rule broke.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let policy_error = || {
        ApiError::BadRequest(
            "Password must be 8-16 characters with at least one uppercase letter and one special character"
                .to_string(),
        )
    };

    let length = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&length) {
        return Err(policy_error());
    }

    let mut has_uppercase = false;
    let mut has_special = false;
    for c in password.chars() {
        if c.is_ascii_uppercase() {
            has_uppercase = true;
        } else if PASSWORD_SPECIALS.contains(c) {
            has_special = true;
        } else if !c.is_ascii_alphanumeric() {
            // Outside the allowed alphabet entirely.
            return Err(policy_error());
        }
    }

    if !has_uppercase || !has_special {
        return Err(policy_error());
    }
    Ok(())
}

/// validate_email
///
/// Shape check only: one `@`, a non-empty local part, and a domain containing
/// a dot with non-empty segments around it. No whitespace anywhere. Anything
/// stricter belongs to an email verification flow, not the API.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let shape_error = || ApiError::BadRequest("Invalid email format".to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(shape_error());
    }
    let (local, domain) = email.split_once('@').ok_or_else(shape_error)?;
    if local.is_empty() || domain.contains('@') {
        return Err(shape_error());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(shape_error()),
    }
}

/// validate_rating
///
/// Ratings are whole stars from 1 to 5. Checked here first and re-enforced by
/// the database CHECK constraint.
pub fn validate_rating(rating: i16) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<(), ApiError>) -> String {
        match result {
            Err(ApiError::BadRequest(message)) => message,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn password_policy_accepts_conforming_values() {
        assert!(validate_password("Abc123!@").is_ok());
        assert!(validate_password("A1!aaaaa").is_ok());
        // Exactly 16 characters.
        assert!(validate_password("Abcdefghijkl12!@").is_ok());
    }

    #[test]
    fn password_policy_rejects_missing_classes_and_bad_lengths() {
        // No uppercase, no special.
        assert!(validate_password("abc12345").is_err());
        // Uppercase but no special.
        assert!(validate_password("Abc12345").is_err());
        // Special but no uppercase.
        assert!(validate_password("abc1234!").is_err());
        // Too short / too long.
        assert!(validate_password("Ab1!").is_err());
        assert!(validate_password("Abcdefghijklm12!@").is_err());
        // Disallowed character (space).
        assert!(validate_password("Abc 123!").is_err());

        assert_eq!(
            message(validate_password("abc12345")),
            "Password must be 8-16 characters with at least one uppercase letter and one special character"
        );
    }

    #[test]
    fn name_policy_enforces_bounds() {
        assert!(validate_name(&"a".repeat(19)).is_err());
        assert!(validate_name(&"a".repeat(20)).is_ok());
        assert!(validate_name(&"a".repeat(60)).is_ok());
        assert!(validate_name(&"a".repeat(61)).is_err());
        assert_eq!(
            message(validate_name("too short")),
            "Name must be between 20 and 60 characters"
        );
    }

    #[test]
    fn address_policy_caps_length() {
        assert!(validate_address(&"a".repeat(400)).is_ok());
        assert!(validate_address(&"a".repeat(401)).is_err());
    }

    #[test]
    fn email_shape_checks() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a@b.c").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@example").is_err());
        assert!(validate_email("user@.com").is_err());
        assert!(validate_email("user@example.").is_err());
        assert!(validate_email("us er@example.com").is_err());
        assert!(validate_email("user@@example.com").is_err());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
        assert_eq!(message(validate_rating(9)), "Rating must be between 1 and 5");
    }
}
