//! Coupon queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use ecom_core::{CouponId, CouponKind};

use super::RepositoryError;
use crate::models::Coupon;

const COUPON_COLUMNS: &str = "id, code, type, value, minimum_amount, maximum_discount, \
     usage_limit, used_count, is_active, start_date, end_date, created_at, updated_at";

/// Fields for a new coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub value: Decimal,
    pub minimum_amount: Option<Decimal>,
    pub maximum_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewCoupon {
    /// Normalized coupon code: trimmed and uppercased.
    #[must_use]
    pub fn normalized_code(&self) -> String {
        normalize_code(&self.code)
    }

    /// Check value ranges and the validity window.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("Coupon code is required".to_string());
        }
        if self.value <= Decimal::ZERO {
            return Err("Coupon value must be positive".to_string());
        }
        if self.kind == CouponKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err("Percentage coupons cannot exceed 100".to_string());
        }
        if self.minimum_amount.is_some_and(|m| m.is_sign_negative())
            || self.maximum_discount.is_some_and(|m| m.is_sign_negative())
        {
            return Err("Coupon amounts must not be negative".to_string());
        }
        if self.usage_limit.is_some_and(|l| l < 0) {
            return Err("Usage limit must not be negative".to_string());
        }
        if self.end_date <= self.start_date {
            return Err("End date must be after start date".to_string());
        }
        Ok(())
    }
}

/// Canonical form of a coupon code as entered by a customer.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// All coupons, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(pool: &PgPool) -> Result<Vec<Coupon>, RepositoryError> {
    let coupons = sqlx::query_as::<_, Coupon>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(coupons)
}

/// A coupon by its normalized code.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>, RepositoryError> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(coupon)
}

/// Lock a coupon by code so its usage count can be checked and bumped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(conn)
    .await?;
    Ok(coupon)
}

/// Count one more redemption.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn increment_usage(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE coupons SET used_count = used_count + 1, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Create a coupon.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the code is taken.
pub async fn create(pool: &PgPool, new: &NewCoupon) -> Result<Coupon, RepositoryError> {
    sqlx::query_as::<_, Coupon>(&format!(
        "INSERT INTO coupons \
             (code, type, value, minimum_amount, maximum_discount, usage_limit, start_date, \
              end_date, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {COUPON_COLUMNS}"
    ))
    .bind(new.normalized_code())
    .bind(new.kind)
    .bind(new.value)
    .bind(new.minimum_amount)
    .bind(new.maximum_discount)
    .bind(new.usage_limit)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.is_active)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "Coupon code already exists"))
}

/// Delete a coupon. Orders keep the code as plain text.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the coupon does not exist.
pub async fn delete(pool: &PgPool, id: CouponId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(kind: CouponKind, value: i64) -> NewCoupon {
        let start = Utc::now();
        NewCoupon {
            code: " welcome10 ".to_string(),
            kind,
            value: Decimal::from(value),
            minimum_amount: None,
            maximum_discount: None,
            usage_limit: Some(100),
            start_date: start,
            end_date: start + Duration::days(30),
            is_active: true,
        }
    }

    #[test]
    fn test_code_is_normalized() {
        assert_eq!(coupon(CouponKind::Percentage, 10).normalized_code(), "WELCOME10");
    }

    #[test]
    fn test_validate_accepts_reasonable_coupon() {
        assert!(coupon(CouponKind::Percentage, 10).validate().is_ok());
        assert!(coupon(CouponKind::Fixed, 50_000).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(coupon(CouponKind::Percentage, 0).validate().is_err());
        assert!(coupon(CouponKind::Percentage, 101).validate().is_err());
        assert!(coupon(CouponKind::Fixed, 101).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut c = coupon(CouponKind::Fixed, 10);
        c.end_date = c.start_date;
        assert_eq!(
            c.validate(),
            Err("End date must be after start date".to_string())
        );
    }
}
