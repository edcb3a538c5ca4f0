//! Refresh token storage.
//!
//! Tokens are opaque random strings. A row exists for as long as the token
//! is valid; logout deletes it.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ecom_core::UserId;

use super::RepositoryError;

/// Store a newly issued refresh token.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(
    pool: &PgPool,
    user_id: UserId,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Owner of an unexpired refresh token.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_valid_owner(
    pool: &PgPool,
    token: &str,
) -> Result<Option<UserId>, RepositoryError> {
    let row: Option<(UserId,)> = sqlx::query_as(
        "SELECT user_id FROM refresh_tokens WHERE token = $1 AND expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

/// Delete one of a user's refresh tokens. Returns whether a row was removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete_for_user(
    pool: &PgPool,
    user_id: UserId,
    token: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token = $2")
        .bind(user_id)
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove expired tokens. Returns the number deleted.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
