//! Order queries.
//!
//! Writes that must happen together (placing, cancelling, settling) take a
//! `&mut PgConnection` so the caller owns the transaction.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use ecom_core::{
    CurrencyCode, OrderId, OrderStatus, Pagination, PaymentMethod, PaymentStatus, ProductId,
    UserId,
};

use super::RepositoryError;
use super::payments;
use super::products::PRODUCT_COLUMNS;
use crate::models::{Order, OrderDetail, OrderItem, OrderWithItems, Product, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, payment_method, \
     subtotal, tax_amount, shipping_amount, discount_amount, total_amount, currency, coupon_code, \
     notes, order_date, shipped_at, delivered_at, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, product_sku, quantity, unit_price, total_price";

const ADDRESS_COLUMNS: &str = "first_name, last_name, company, address1, address2, city, state, \
     postal_code, country, phone";

/// Header row of a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

/// One priced line of a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Lock a live product row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_product(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p \
         WHERE p.id = $1 AND p.deleted_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

/// Take `quantity` units from stock. Returns `false` when stock is short.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = NOW() \
         WHERE id = $1 AND stock >= $2",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Put every line of an order back into stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn restore_stock(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW() \
         FROM order_items oi WHERE oi.order_id = $1 AND oi.product_id = p.id",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert an order header in `pending` state.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` on an order number collision.
pub async fn insert(conn: &mut PgConnection, new: &NewOrder) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO orders \
             (order_number, user_id, payment_method, subtotal, tax_amount, shipping_amount, \
              discount_amount, total_amount, currency, coupon_code, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(&new.order_number)
    .bind(new.user_id)
    .bind(new.payment_method)
    .bind(new.subtotal)
    .bind(new.tax_amount)
    .bind(new.shipping_amount)
    .bind(new.discount_amount)
    .bind(new.total_amount)
    .bind(new.currency)
    .bind(&new.coupon_code)
    .bind(&new.notes)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, "Order number already exists"))
}

/// Insert one order line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &NewOrderItem,
) -> Result<OrderItem, RepositoryError> {
    let row = sqlx::query_as::<_, OrderItem>(&format!(
        "INSERT INTO order_items \
             (order_id, product_id, product_name, product_sku, quantity, unit_price, total_price) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {ITEM_COLUMNS}"
    ))
    .bind(order_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(&item.product_sku)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.total_price)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Insert the shipping address of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_address(
    conn: &mut PgConnection,
    order_id: OrderId,
    address: &ShippingAddress,
) -> Result<ShippingAddress, RepositoryError> {
    let row = sqlx::query_as::<_, ShippingAddress>(&format!(
        "INSERT INTO shipping_addresses \
             (order_id, first_name, last_name, company, address1, address2, city, state, \
              postal_code, country, phone) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(order_id)
    .bind(address.first_name.trim())
    .bind(address.last_name.trim())
    .bind(&address.company)
    .bind(address.address1.trim())
    .bind(&address.address2)
    .bind(address.city.trim())
    .bind(&address.state)
    .bind(address.postal_code.trim())
    .bind(address.country.trim())
    .bind(&address.phone)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

async fn items_for(pool: &PgPool, orders: &[Order]) -> Result<Vec<OrderItem>, RepositoryError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Attach item lists to their orders, keeping the order sequence.
fn group_items(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<OrderWithItems> {
    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }
    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect()
}

/// The user's orders with their lines, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: UserId,
) -> Result<Vec<OrderWithItems>, RepositoryError> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE user_id = $1 AND deleted_at IS NULL \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let items = items_for(pool, &orders).await?;
    Ok(group_items(orders, items))
}

/// All orders for the admin view, optionally filtered by status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(
    pool: &PgPool,
    status: Option<OrderStatus>,
    page: Pagination,
) -> Result<(Vec<OrderWithItems>, i64), RepositoryError> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR status = $1) \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(status)
    .bind(page.normalized().limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR status = $1)",
    )
    .bind(status)
    .fetch_one(pool)
    .await?;

    let items = items_for(pool, &orders).await?;
    Ok((group_items(orders, items), total))
}

/// A live order header, scoped to `owner` when given.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    pool: &PgPool,
    id: OrderId,
    owner: Option<UserId>,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE id = $1 AND deleted_at IS NULL AND ($2::INTEGER IS NULL OR user_id = $2)"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(pool)
    .await?;
    Ok(order)
}

/// Full order view: lines, shipping address and payments.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_detail(
    pool: &PgPool,
    id: OrderId,
    owner: Option<UserId>,
) -> Result<Option<OrderDetail>, RepositoryError> {
    let Some(order) = get(pool, id, owner).await? else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;

    let shipping_address = sqlx::query_as::<_, ShippingAddress>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM shipping_addresses WHERE order_id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let payments = payments::list_for_order(pool, id).await?;

    Ok(Some(OrderDetail {
        order,
        items,
        shipping_address,
        payments,
    }))
}

/// Lock an order row for a status or payment change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: OrderId,
    owner: Option<UserId>,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE id = $1 AND deleted_at IS NULL AND ($2::INTEGER IS NULL OR user_id = $2) \
         FOR UPDATE"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Set the fulfilment status, stamping the matching timestamp.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $2, \
             shipped_at = CASE WHEN $2 = 'shipped' THEN NOW() ELSE shipped_at END, \
             delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END, \
             cancelled_at = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE cancelled_at END, \
             updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Record a payment outcome on the order. A successful payment also confirms
/// a pending order.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET payment_status = $2, \
             status = CASE WHEN $2 = 'paid' AND status = 'pending' THEN 'confirmed' ELSE status END, \
             updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(payment_status)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}
