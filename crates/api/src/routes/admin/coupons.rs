//! Coupon administration.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::CouponId;

use crate::db::coupons::{self, NewCoupon};
use crate::error::{AppError, OrNotFound, Result};
use crate::middleware::RequireAdmin;
use crate::models::Coupon;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", delete(destroy))
}

/// `GET /admin/coupons`
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let coupons = coupons::list(state.pool()).await?;
    Ok(Json(json!({ "coupons": coupons })))
}

/// `POST /admin/coupons`
#[instrument(skip_all, fields(admin_id = %admin.id, code = %new.code))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(new): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>)> {
    new.validate().map_err(AppError::BadRequest)?;

    let coupon = coupons::create(state.pool(), &new).await?;
    info!(coupon_id = %coupon.id, kind = %coupon.kind, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// `DELETE /admin/coupons/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, coupon_id = %id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<Json<Value>> {
    coupons::delete(state.pool(), id)
        .await
        .or_not_found("Coupon not found")?;
    info!("Coupon deleted");
    Ok(Json(json!({ "message": "Coupon deleted successfully" })))
}
