//! Cart queries. Every user has at most one cart, created on first access.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use ecom_core::{CartId, CartItemId, ProductId, UserId};

use super::RepositoryError;
use super::products::PRODUCT_COLUMNS;
use crate::models::{CartItemView, CartView, Product};

/// A cart line as stored, before joining the product.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    item_id: CartItemId,
    quantity: i32,
    #[sqlx(flatten)]
    product: Product,
}

/// Return the user's cart ID, creating the cart if needed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_or_create(pool: &PgPool, user_id: UserId) -> Result<CartId, RepositoryError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let (id,): (CartId,) = sqlx::query_as(
        "INSERT INTO carts (user_id) VALUES ($1) \
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
         RETURNING id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Load the user's cart with live products attached to each line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn load(pool: &PgPool, user_id: UserId) -> Result<CartView, RepositoryError> {
    let cart_id = get_or_create(pool, user_id).await?;

    let rows = sqlx::query_as::<_, CartLineRow>(&format!(
        "SELECT ci.id AS item_id, ci.quantity, {PRODUCT_COLUMNS} \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = $1 AND p.deleted_at IS NULL \
         ORDER BY ci.created_at, ci.id"
    ))
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemView {
            id: row.item_id,
            product_id: row.product.id,
            quantity: row.quantity,
            product: row.product,
        })
        .collect();

    Ok(CartView {
        id: cart_id,
        user_id,
        items,
    })
}

/// Quantity of a product already in the cart, zero if absent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn quantity_of(
    pool: &PgPool,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<i32, RepositoryError> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map_or(0, |(q,)| q))
}

/// Add a product to the cart, merging with an existing line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn add_item(
    pool: &PgPool,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
) -> Result<CartLine, RepositoryError> {
    let line = sqlx::query_as::<_, CartLine>(
        "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3) \
         ON CONFLICT (cart_id, product_id) DO UPDATE \
             SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW() \
         RETURNING id, product_id, quantity",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(pool)
    .await?;
    Ok(line)
}

/// A line from the user's own cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_item(
    pool: &PgPool,
    user_id: UserId,
    item_id: CartItemId,
) -> Result<Option<CartLine>, RepositoryError> {
    let line = sqlx::query_as::<_, CartLine>(
        "SELECT ci.id, ci.product_id, ci.quantity \
         FROM cart_items ci JOIN carts c ON c.id = ci.cart_id \
         WHERE ci.id = $1 AND c.user_id = $2",
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(line)
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the line is gone.
pub async fn set_quantity(
    pool: &PgPool,
    item_id: CartItemId,
    quantity: i32,
) -> Result<CartLine, RepositoryError> {
    sqlx::query_as::<_, CartLine>(
        "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 \
         RETURNING id, product_id, quantity",
    )
    .bind(item_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Remove a line from the user's own cart.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the line is not in the user's cart.
pub async fn remove_item(
    pool: &PgPool,
    user_id: UserId,
    item_id: CartItemId,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "DELETE FROM cart_items ci USING carts c \
         WHERE ci.cart_id = c.id AND ci.id = $1 AND c.user_id = $2",
    )
    .bind(item_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Empty the user's cart. The cart row itself is kept.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "DELETE FROM cart_items ci USING carts c WHERE ci.cart_id = c.id AND c.user_id = $1",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
