use thiserror::Error;

use crate::errors::FieldErrors;

/// Business errors for auth workflows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("invalid token")]
    InvalidToken,
    #[error("user inactive or deleted")]
    InactiveUser,
    #[error("invalid password reset link")]
    InvalidResetLink,
    #[error("not found")]
    NotFound,
    #[error("hashing error: {0}")]
    HashError(String),
    #[error("token error: {0}")]
    TokenError(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::InvalidToken => 1004,
            AuthError::InactiveUser => 1005,
            AuthError::InvalidResetLink => 1006,
            AuthError::NotFound => 1003,
            AuthError::HashError(_) => 1101,
            AuthError::TokenError(_) => 1102,
            AuthError::Repository(_) => 1200,
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AuthError::Validation(FieldErrors::single(field, message))
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        AuthError::Validation(FieldErrors::non_field(message))
    }
}

impl From<FieldErrors> for AuthError {
    fn from(errs: FieldErrors) -> Self {
        AuthError::Validation(errs)
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(e: sea_orm::DbErr) -> Self {
        AuthError::Repository(e.to_string())
    }
}
