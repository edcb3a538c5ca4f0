//! Partner queries.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use ecom_core::{Email, Pagination, PartnerId};

use super::RepositoryError;
use crate::models::Partner;

const PARTNER_COLUMNS: &str = "id, name, email, api_key, secret_key, webhook_url, is_active, \
     commission_rate, created_at, updated_at";

/// Fields for a new partner. Keys are generated by the caller.
#[derive(Debug, Clone)]
pub struct NewPartner {
    pub name: String,
    pub email: Email,
    pub webhook_url: Option<String>,
    pub commission_rate: Decimal,
    pub api_key: String,
    pub secret_key: String,
}

/// Partial partner update. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub webhook_url: Option<String>,
    pub commission_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Live partners, newest first, optionally filtered by name or email.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(
    pool: &PgPool,
    search: Option<&str>,
    page: Pagination,
) -> Result<(Vec<Partner>, i64), RepositoryError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let partners = sqlx::query_as::<_, Partner>(&format!(
        "SELECT {PARTNER_COLUMNS} FROM partners \
         WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1) \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(&pattern)
    .bind(page.normalized().limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM partners \
         WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1)",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    Ok((partners, total))
}

/// A live partner by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(pool: &PgPool, id: PartnerId) -> Result<Option<Partner>, RepositoryError> {
    let partner = sqlx::query_as::<_, Partner>(&format!(
        "SELECT {PARTNER_COLUMNS} FROM partners WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(partner)
}

/// An active, live partner by API key.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_active_by_api_key(
    pool: &PgPool,
    api_key: &str,
) -> Result<Option<Partner>, RepositoryError> {
    let partner = sqlx::query_as::<_, Partner>(&format!(
        "SELECT {PARTNER_COLUMNS} FROM partners \
         WHERE api_key = $1 AND is_active AND deleted_at IS NULL"
    ))
    .bind(api_key)
    .fetch_optional(pool)
    .await?;
    Ok(partner)
}

/// Create a partner.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the email is taken.
pub async fn create(pool: &PgPool, new: &NewPartner) -> Result<Partner, RepositoryError> {
    sqlx::query_as::<_, Partner>(&format!(
        "INSERT INTO partners (name, email, webhook_url, commission_rate, api_key, secret_key) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {PARTNER_COLUMNS}"
    ))
    .bind(new.name.trim())
    .bind(&new.email)
    .bind(&new.webhook_url)
    .bind(new.commission_rate)
    .bind(&new.api_key)
    .bind(&new.secret_key)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "Partner email already exists"))
}

/// Apply a partial update. `email` must already be normalized.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the partner does not exist and
/// `RepositoryError::Conflict` if the new email is taken.
pub async fn update(
    pool: &PgPool,
    id: PartnerId,
    update: &PartnerUpdate,
    email: Option<&Email>,
) -> Result<Partner, RepositoryError> {
    sqlx::query_as::<_, Partner>(&format!(
        "UPDATE partners SET \
             name = COALESCE($2, name), \
             email = COALESCE($3, email), \
             webhook_url = COALESCE($4, webhook_url), \
             commission_rate = COALESCE($5, commission_rate), \
             is_active = COALESCE($6, is_active), \
             updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {PARTNER_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name.as_deref().map(str::trim))
    .bind(email)
    .bind(&update.webhook_url)
    .bind(update.commission_rate)
    .bind(update.is_active)
    .fetch_optional(pool)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "Partner email already exists"))?
    .ok_or(RepositoryError::NotFound)
}

/// Flip `is_active`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the partner does not exist.
pub async fn toggle_status(pool: &PgPool, id: PartnerId) -> Result<Partner, RepositoryError> {
    sqlx::query_as::<_, Partner>(&format!(
        "UPDATE partners SET is_active = NOT is_active, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {PARTNER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Replace both API keys.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the partner does not exist.
pub async fn set_keys(
    pool: &PgPool,
    id: PartnerId,
    api_key: &str,
    secret_key: &str,
) -> Result<Partner, RepositoryError> {
    sqlx::query_as::<_, Partner>(&format!(
        "UPDATE partners SET api_key = $2, secret_key = $3, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {PARTNER_COLUMNS}"
    ))
    .bind(id)
    .bind(api_key)
    .bind(secret_key)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Soft-delete a partner. Its API key stops working immediately.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the partner does not exist.
pub async fn soft_delete(pool: &PgPool, id: PartnerId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE partners SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
