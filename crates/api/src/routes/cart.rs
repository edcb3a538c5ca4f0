//! Shopping cart for the signed-in user.
//!
//! The cart is created lazily on first access. Stock is checked when lines
//! are added or changed, and again at checkout.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{CartItemId, ProductId};

use crate::db::{RepositoryError, carts, products};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::Product;
use crate::state::AppState;

/// Build the `/cart` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show))
        .route("/add", post(add))
        .route("/items/{item_id}", put(update_item).delete(remove_item))
        .route("/clear", delete(clear))
}

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

fn check_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }
    Ok(())
}

fn check_stock(product: &Product, wanted: i32) -> Result<()> {
    if wanted > product.stock {
        return Err(AppError::BadRequest("Insufficient stock".to_string()));
    }
    Ok(())
}

async fn active_product(state: &AppState, id: ProductId) -> Result<Product> {
    products::get(state.pool(), id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// `GET /cart`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let cart = carts::load(state.pool(), user.id).await?;
    let total = state.config().pricing.currency.round(cart.total());
    Ok(Json(json!({ "cart": cart, "total": total })))
}

/// `POST /cart/add`
#[instrument(skip_all, fields(user_id = %user.id, product_id = %form.product_id))]
pub async fn add(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(form): Json<AddToCart>,
) -> Result<Json<Value>> {
    check_quantity(form.quantity)?;
    let product = active_product(&state, form.product_id).await?;
    check_stock(&product, form.quantity)?;

    let cart_id = carts::get_or_create(state.pool(), user.id).await?;
    let existing = carts::quantity_of(state.pool(), cart_id, product.id).await?;
    check_stock(&product, existing.saturating_add(form.quantity))?;

    let line = carts::add_item(state.pool(), cart_id, product.id, form.quantity).await?;
    info!(item_id = %line.id, quantity = line.quantity, "Added to cart");

    Ok(Json(json!({ "message": "Product added to cart", "item": line })))
}

/// `PUT /cart/items/{item_id}`
#[instrument(skip_all, fields(user_id = %user.id, item_id = %item_id))]
pub async fn update_item(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(item_id): Path<CartItemId>,
    Json(form): Json<UpdateQuantity>,
) -> Result<Json<Value>> {
    check_quantity(form.quantity)?;
    let line = carts::get_item(state.pool(), user.id, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

    let product = active_product(&state, line.product_id).await?;
    check_stock(&product, form.quantity)?;

    let line = carts::set_quantity(state.pool(), item_id, form.quantity).await?;
    Ok(Json(json!({ "message": "Cart item updated", "item": line })))
}

/// `DELETE /cart/items/{item_id}`
#[instrument(skip_all, fields(user_id = %user.id, item_id = %item_id))]
pub async fn remove_item(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Value>> {
    carts::remove_item(state.pool(), user.id, item_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Cart item not found".to_string()),
            other => other.into(),
        })?;
    Ok(Json(json!({ "message": "Item removed from cart" })))
}

/// `DELETE /cart/clear`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn clear(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let mut conn = state.pool().acquire().await.map_err(RepositoryError::from)?;
    let removed = carts::clear(&mut conn, user.id).await?;
    info!(removed, "Cart cleared");
    Ok(Json(json!({ "message": "Cart cleared" })))
}
