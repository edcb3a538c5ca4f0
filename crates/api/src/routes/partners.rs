//! Partner API: products owned by the calling partner.
//!
//! Partners authenticate with `X-API-Key` / `X-Secret-Key`. New products
//! start inactive and wait for admin approval.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{Pagination, ProductId};

use crate::db::products::{self, NewProduct, ProductUpdate};
use crate::error::{AppError, OrNotFound, Result};
use crate::middleware::RequirePartner;
use crate::state::AppState;

/// Build the `/partners` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(products_index).post(create_product))
        .route("/products/{id}", put(update_product))
}

/// `GET /partners/products`
#[instrument(skip_all, fields(partner_id = %partner.id))]
pub async fn products_index(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Value>> {
    let page = page.normalized();
    let all = products::list_by_partner(state.pool(), partner.id).await?;
    let total = i64::try_from(all.len()).unwrap_or(i64::MAX);
    let products: Vec<_> = all
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit).unwrap_or(0))
        .collect();

    Ok(Json(json!({ "products": products, "pagination": page.info(total) })))
}

/// `POST /partners/products`
#[instrument(skip_all, fields(partner_id = %partner.id, sku = %new.sku))]
pub async fn create_product(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
    Json(mut new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Value>)> {
    new.validate().map_err(AppError::BadRequest)?;
    new.is_active = false;

    let product = products::create(state.pool(), &new, Some(partner.id)).await?;
    state.catalog().invalidate_all();
    info!(product_id = %product.id, "Partner product submitted for approval");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Product created successfully and pending approval",
            "product": product,
        })),
    ))
}

/// `PUT /partners/products/{id}`
///
/// Partners cannot change the active flag; approval stays with admins.
#[instrument(skip_all, fields(partner_id = %partner.id, product_id = %id))]
pub async fn update_product(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(mut update): Json<ProductUpdate>,
) -> Result<Json<Value>> {
    update.validate().map_err(AppError::BadRequest)?;
    update.is_active = None;

    let product = products::update(state.pool(), id, &update, Some(partner.id))
        .await
        .or_not_found("Product not found")?;
    state.catalog().invalidate_all();

    Ok(Json(json!({ "message": "Product updated successfully", "product": product })))
}
