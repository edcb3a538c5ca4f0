//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] ecom_core::EmailError),

    /// Invalid credentials (wrong password, unknown email or inactive user).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated.
    #[error("account is deactivated")]
    AccountDisabled,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// A required registration field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Access token missing, malformed, expired or badly signed.
    #[error("invalid token")]
    InvalidToken,

    /// Refresh token unknown or expired.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Google rejected the ID token or it failed our checks.
    #[error("google token rejected: {0}")]
    GoogleToken(String),

    /// Google's token endpoint could not be reached.
    #[error("google tokeninfo request failed: {0}")]
    GoogleUnavailable(#[from] reqwest::Error),

    /// Access token could not be signed.
    #[error("token encoding error: {0}")]
    TokenEncoding(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::UserAlreadyExists,
            RepositoryError::NotFound => Self::UserNotFound,
            other => Self::Repository(other),
        }
    }
}
