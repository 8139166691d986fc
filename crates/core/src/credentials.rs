//! Credential and naming rules applied to user input before it is stored.
//!
//! Filenames double as job correlation keys on the broker, so
//! [`validate_filename`] is deliberately stricter than most object stores.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length of a display name.
pub const MIN_NAME_LENGTH: usize = 3;

/// Maximum length of an uploaded filename.
pub const MAX_FILENAME_LENGTH: usize = 255;

static UPPER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static LOWER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").expect("valid regex"));
static SPECIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W_]").expect("valid regex"));

/// Enforce the password policy: at least [`MIN_PASSWORD_LENGTH`] characters
/// with an uppercase letter, a lowercase letter, a digit and a special
/// character.
pub fn validate_password(password: &str) -> Result<(), CoreError> {
    let ok = password.chars().count() >= MIN_PASSWORD_LENGTH
        && UPPER_RE.is_match(password)
        && LOWER_RE.is_match(password)
        && DIGIT_RE.is_match(password)
        && SPECIAL_RE.is_match(password);

    if ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long and contain \
             uppercase and lowercase letters, numbers, and special characters"
        )))
    }
}

/// Display names are alphabetic words separated by single spaces.
pub fn validate_display_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    let alphabetic = trimmed
        .split(' ')
        .all(|word| !word.is_empty() && word.chars().all(char::is_alphabetic));

    if trimmed.chars().count() >= MIN_NAME_LENGTH && alphabetic {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Name must be at least {MIN_NAME_LENGTH} characters and contain only letters"
        )))
    }
}

/// Reject filenames that could escape a storage prefix or would make a
/// poor correlation key.
pub fn validate_filename(filename: &str) -> Result<(), CoreError> {
    if filename.is_empty() || filename.trim() != filename {
        return Err(CoreError::Validation(
            "Filename must not be empty or padded with whitespace".into(),
        ));
    }
    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Filename exceeds {MAX_FILENAME_LENGTH} bytes"
        )));
    }
    if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(CoreError::Validation(format!(
            "Filename '{filename}' must not contain path separators"
        )));
    }
    if filename.chars().any(char::is_control) {
        return Err(CoreError::Validation(
            "Filename must not contain control characters".into(),
        ));
    }
    // Echoed back inside a quoted Content-Disposition parameter.
    if filename.contains('"') {
        return Err(CoreError::Validation(
            "Filename must not contain double quotes".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(validate_password("Str0ng!pass").is_ok());
    }

    #[test]
    fn password_missing_special_character_fails() {
        assert!(validate_password("Str0ngpass").is_err());
    }

    #[test]
    fn password_missing_uppercase_fails() {
        assert!(validate_password("str0ng!pass").is_err());
    }

    #[test]
    fn password_missing_digit_fails() {
        assert!(validate_password("Strong!pass").is_err());
    }

    #[test]
    fn short_password_fails() {
        let err = validate_password("S0!a").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));
    }

    #[test]
    fn underscore_counts_as_special() {
        assert!(validate_password("Str0ng_pass").is_ok());
    }

    #[test]
    fn display_name_rules() {
        assert!(validate_display_name("Ada Lovelace").is_ok());
        assert!(validate_display_name("Al").is_err());
        assert!(validate_display_name("R2D2").is_err());
        assert!(validate_display_name("Ada  Lovelace").is_err());
    }

    #[test]
    fn filename_rules() {
        assert!(validate_filename("design.v").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename(" design.v").is_err());
        assert!(validate_filename("../design.v").is_err());
        assert!(validate_filename("dir\\design.v").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("bad\nname.v").is_err());
        assert!(validate_filename("a\".v").is_err());
        assert!(validate_filename("it's.v").is_ok());
    }
}
