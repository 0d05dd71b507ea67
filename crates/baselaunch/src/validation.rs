//! Input validation for user-supplied fields
//!
//! Forms validate before anything is sent to the API or written to the
//! store. Each validator returns [`Error::Validation`] naming the field and
//! the broken rule, and logs the rejection at debug level.
//!
//! # Examples
//!
//! ```rust
//! use baselaunch::validation::{sanitize_input, validate_name, validate_rating};
//!
//! validate_name("Frame Wallet")?;
//! validate_rating(5)?;
//! assert_eq!(sanitize_input("  <b>hi</b> "), "bhi/b");
//! # Ok::<(), baselaunch::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::observability::log_validation_error;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest accepted name
pub const NAME_MIN_LENGTH: usize = 1;

/// Longest accepted name
pub const NAME_MAX_LENGTH: usize = 50;

/// Longest accepted description
pub const DESCRIPTION_MAX_LENGTH: usize = 500;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static REFERRAL_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{6,8}$").expect("referral pattern is valid"));

fn reject(field: &'static str, reason: impl Into<String>) -> Error {
    let reason = reason.into();
    log_validation_error(field, &reason);
    Error::Validation { field, reason }
}

/// Validate an email address.
///
/// # Errors
///
/// Returns `Error::Validation` unless the address looks like `local@domain.tld`.
pub fn validate_email(email: &str) -> Result<()> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(reject("email", "must look like name@example.com"))
    }
}

/// Validate a display or app name.
///
/// Length is counted in characters, not bytes.
///
/// # Errors
///
/// Returns `Error::Validation` if the name is empty or longer than
/// [`NAME_MAX_LENGTH`] characters.
pub fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if (NAME_MIN_LENGTH..=NAME_MAX_LENGTH).contains(&len) {
        Ok(())
    } else {
        Err(reject(
            "name",
            format!("must be {NAME_MIN_LENGTH} to {NAME_MAX_LENGTH} characters, got {len}"),
        ))
    }
}

/// Validate an app description.
///
/// # Errors
///
/// Returns `Error::Validation` if the description is empty or longer than
/// [`DESCRIPTION_MAX_LENGTH`] characters.
pub fn validate_description(description: &str) -> Result<()> {
    let len = description.chars().count();
    if len == 0 {
        return Err(reject("description", "must not be empty"));
    }
    if len > DESCRIPTION_MAX_LENGTH {
        return Err(reject(
            "description",
            format!("must be at most {DESCRIPTION_MAX_LENGTH} characters, got {len}"),
        ));
    }
    Ok(())
}

/// Validate a referral code: 6 to 8 uppercase letters or digits.
///
/// # Errors
///
/// Returns `Error::Validation` for any other shape.
pub fn validate_referral_code(code: &str) -> Result<()> {
    if REFERRAL_CODE.is_match(code) {
        Ok(())
    } else {
        Err(reject(
            "referral_code",
            "must be 6 to 8 uppercase letters or digits",
        ))
    }
}

/// Validate a star rating.
///
/// # Errors
///
/// Returns `Error::Validation` unless `rating` is between 1 and 5.
pub fn validate_rating(rating: i64) -> Result<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(reject("rating", format!("must be between 1 and 5, got {rating}")))
    }
}

/// Trim surrounding whitespace and strip angle brackets.
pub fn sanitize_input(input: &str) -> String {
    input.trim().chars().filter(|c| !matches!(c, '<' | '>')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dev@base.org", true)]
    #[case("a@b.co", true)]
    #[case("no-at-sign.org", false)]
    #[case("two@@base.org", false)]
    #[case("spaces in@base.org", false)]
    #[case("missing@tld", false)]
    fn test_validate_email(#[case] email: &str, #[case] ok: bool) {
        assert_eq!(validate_email(email).is_ok(), ok);
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(validate_name("").is_err());
        assert!(validate_name("A").is_ok());
        assert!(validate_name(&"x".repeat(50)).is_ok());
        assert!(validate_name(&"x".repeat(51)).is_err());
        // Multi-byte characters count once.
        assert!(validate_name(&"é".repeat(50)).is_ok());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description("").is_err());
        assert!(validate_description(&"d".repeat(500)).is_ok());

        let err = validate_description(&"d".repeat(501)).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "description", .. }));
    }

    #[rstest]
    #[case("ABC123", true)]
    #[case("ABCD1234", true)]
    #[case("ABC12", false)]
    #[case("ABCDE12345", false)]
    #[case("abc123", false)]
    fn test_validate_referral_code(#[case] code: &str, #[case] ok: bool) {
        assert_eq!(validate_referral_code(code).is_ok(), ok);
    }

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(0).is_err());
        assert!((1..=5).all(|r| validate_rating(r).is_ok()));
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input("  hello  "), "hello");
        assert_eq!(
            sanitize_input("<script>alert(1)</script>"),
            "scriptalert(1)/script"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = validate_rating(9).unwrap_err();
        assert_eq!(err.to_string(), "Invalid rating: must be between 1 and 5, got 9");
        assert!(!err.is_retryable());
    }
}
