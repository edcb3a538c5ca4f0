//! Catalog administration: create, edit, approve and retire products.
//!
//! Every write clears the product list cache so the storefront picks up the
//! change on its next request.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{Pagination, ProductId};

use crate::db::products::{self, NewProduct, ProductUpdate};
use crate::error::{AppError, OrNotFound, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::state::AppState;

const PRODUCT_NOT_FOUND: &str = "Product not found";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/pending", get(pending))
        .route("/{id}", put(update).delete(destroy))
        .route("/{id}/approve", post(approve))
}

/// `GET /admin/products/pending`
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn pending(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Value>> {
    let page = page.normalized();
    let (products, total) = products::list_pending(state.pool(), page).await?;
    Ok(Json(json!({
        "products": products,
        "total": total,
        "page": page.page,
        "limit": page.limit,
    })))
}

/// `POST /admin/products`
#[instrument(skip_all, fields(admin_id = %admin.id, sku = %new.sku))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(new): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    new.validate().map_err(AppError::BadRequest)?;

    let product = products::create(state.pool(), &new, None).await?;
    state.catalog().invalidate_all();

    let product_id = product.id.to_string();
    add_breadcrumb("catalog", "Product created", Some(&[("product_id", &product_id)]));
    info!(product_id = %product.id, slug = %product.slug, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /admin/products/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    update.validate().map_err(AppError::BadRequest)?;

    let product = products::update(state.pool(), id, &update, None)
        .await
        .or_not_found(PRODUCT_NOT_FOUND)?;
    state.catalog().invalidate_all();

    Ok(Json(product))
}

/// `POST /admin/products/{id}/approve`
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn approve(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>> {
    let product = products::approve(state.pool(), id)
        .await
        .or_not_found(PRODUCT_NOT_FOUND)?;
    state.catalog().invalidate_all();
    info!(partner_id = ?product.partner_id, "Product approved");

    Ok(Json(json!({ "message": "Product approved successfully", "product": product })))
}

/// `DELETE /admin/products/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>> {
    products::soft_delete(state.pool(), id)
        .await
        .or_not_found(PRODUCT_NOT_FOUND)?;
    state.catalog().invalidate_all();
    info!("Product deleted");

    Ok(Json(json!({ "message": "Product deleted successfully" })))
}
