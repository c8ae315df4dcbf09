use std::fmt;

use thiserror::Error;

/// Form field named by a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Password,
    Email,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Password => "password",
            Field::Email => "email",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: &'static str,
}

impl ValidationError {
    pub fn new(field: Field, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

/// Failures reported by a credential or session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("username is already taken")]
    UsernameTaken,
    #[error("storage unavailable")]
    StorageUnavailable,
    #[error("internal error")]
    Internal,
}

impl RegisterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegisterError::StorageUnavailable)
    }
}

impl From<StoreError> for RegisterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername => RegisterError::UsernameTaken,
            StoreError::Unavailable(_) => RegisterError::StorageUnavailable,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("storage unavailable")]
    StorageUnavailable,
    #[error("internal error")]
    Internal,
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StorageUnavailable)
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            // lookups never hit the unique constraint
            StoreError::DuplicateUsername => AuthError::Internal,
            StoreError::Unavailable(_) => AuthError::StorageUnavailable,
        }
    }
}
