//! Coupon preview for the checkout page.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::coupons;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::pricing::{CouponError, coupon_discount};
use crate::state::AppState;

/// Build the `/coupons` router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{code}/validate", get(validate))
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount: Decimal,
}

/// `GET /coupons/{code}/validate?subtotal=`
///
/// Applies the same rules as checkout without consuming a use.
#[instrument(skip_all, fields(user_id = %user.id, code = %code))]
pub async fn validate(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ValidateQuery>,
) -> Result<Json<CouponPreview>> {
    let code = coupons::normalize_code(&code);
    let coupon = coupons::find_by_code(state.pool(), &code)
        .await?
        .ok_or(CouponError::NotFound)?;

    let discount = coupon_discount(
        &coupon,
        query.subtotal,
        Utc::now(),
        state.config().pricing.currency,
    )?;

    Ok(Json(CouponPreview {
        code: coupon.code,
        discount,
    }))
}
