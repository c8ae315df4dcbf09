use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::error::{Field, ValidationError};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;
pub const EMAIL_MAX: usize = 254;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len == 0 {
        return Err(ValidationError::new(Field::Username, "must not be empty"));
    }
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ValidationError::new(Field::Username, "must be 3 to 32 characters"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            Field::Username,
            "may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(ValidationError::new(Field::Password, "must be at least 8 characters"));
    }
    if len > PASSWORD_MAX {
        return Err(ValidationError::new(Field::Password, "must be at most 128 characters"));
    }
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(ValidationError::new(
            Field::Password,
            "must contain at least one letter and one digit",
        ));
    }
    Ok(())
}

/// Checks an already trimmed address.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::new(Field::Email, "must not be empty"));
    }
    if email.len() > EMAIL_MAX || has_control(email) || !EMAIL_RE.is_match(email) {
        return Err(ValidationError::new(Field::Email, "malformed address"));
    }
    Ok(())
}

/// Postgres refuses NUL in text columns; no stored value can hold a control
/// character.
pub fn has_control(value: &str) -> bool {
    value.chars().any(char::is_control)
}
