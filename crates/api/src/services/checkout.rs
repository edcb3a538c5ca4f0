//! Order placement and fulfilment status changes.
//!
//! Placing an order is one transaction: products are locked, stock is taken
//! with a guarded update, the coupon is locked and redeemed and the order
//! rows are written. Any failure rolls everything back.
//!
//! Partner orders also get a pending `partner` payment, which the supplying
//! partner later settles through the partner payment webhook.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use ecom_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use crate::config::PricingConfig;
use crate::db::orders::{self, NewOrder, NewOrderItem};
use crate::db::{RepositoryError, carts, coupons, payments};
use crate::models::{Order, OrderDetail, ShippingAddress};
use crate::services::pricing::{self, CouponError};

/// One requested order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub clear_cart: bool,
}

/// Errors from placing or changing orders.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Partner payment requires at least one partner product")]
    NoPartnerProducts,

    #[error("Invalid quantity for product {0}")]
    InvalidQuantity(ProductId),

    #[error("Missing shipping address fields: {}", .0.join(", "))]
    MissingAddressFields(Vec<&'static str>),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product {0}")]
    InsufficientStock(String),

    #[error("{0}")]
    Coupon(#[from] CouponError),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order can no longer be cancelled")]
    NotCancellable,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Merge duplicate product lines, keeping first-seen order.
///
/// # Errors
///
/// Returns `EmptyOrder` for no lines and `InvalidQuantity` for a
/// non-positive or overflowing quantity.
pub fn merge_lines(lines: &[OrderLine]) -> Result<Vec<OrderLine>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity(line.product_id));
        }
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(CheckoutError::InvalidQuantity(line.product_id))?;
            }
            None => merged.push(*line),
        }
    }
    Ok(merged)
}

/// Human-facing order number: `ORD-{user}-{unix seconds}-{4 hex}`.
#[must_use]
pub fn order_number(user_id: UserId, now: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 2];
    rand::rng().fill_bytes(&mut suffix);
    format!(
        "ORD-{user_id}-{}-{}",
        now.timestamp(),
        hex::encode_upper(suffix)
    )
}

/// Place an order for `user_id`.
///
/// # Errors
///
/// Returns a `CheckoutError` describing the first validation, stock or
/// coupon problem. Nothing is written in that case.
#[instrument(skip(pool, pricing, request), fields(user_id = %user_id))]
pub async fn place_order(
    pool: &PgPool,
    pricing: &PricingConfig,
    user_id: UserId,
    request: &PlaceOrder,
) -> Result<OrderDetail, CheckoutError> {
    let lines = merge_lines(&request.items)?;
    let missing = request.shipping_address.missing_fields();
    if !missing.is_empty() {
        return Err(CheckoutError::MissingAddressFields(missing));
    }

    let mut tx = pool.begin().await?;

    // Lock in id order so concurrent checkouts cannot deadlock.
    let mut lock_order: Vec<OrderLine> = lines.clone();
    lock_order.sort_by_key(|l| l.product_id.as_i32());

    let mut priced: HashMap<ProductId, NewOrderItem> = HashMap::with_capacity(lines.len());
    let mut has_partner_product = false;
    for line in &lock_order {
        let product = orders::lock_product(&mut tx, line.product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CheckoutError::ProductNotFound(line.product_id))?;

        if !orders::decrement_stock(&mut tx, product.id, line.quantity).await? {
            return Err(CheckoutError::InsufficientStock(product.name));
        }
        has_partner_product |= product.partner_id.is_some();

        let unit_price = product.effective_price();
        priced.insert(
            product.id,
            NewOrderItem {
                product_id: product.id,
                product_name: product.name,
                product_sku: product.sku,
                quantity: line.quantity,
                unit_price,
                total_price: unit_price * Decimal::from(line.quantity),
            },
        );
    }

    if request.payment_method == PaymentMethod::Partner && !has_partner_product {
        return Err(CheckoutError::NoPartnerProducts);
    }

    let items: Vec<NewOrderItem> = lines
        .iter()
        .filter_map(|line| priced.remove(&line.product_id))
        .collect();
    let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();

    let coupon_code = request
        .coupon_code
        .as_deref()
        .map(coupons::normalize_code)
        .filter(|c| !c.is_empty());
    let mut discount = Decimal::ZERO;
    if let Some(code) = &coupon_code {
        let coupon = coupons::lock_by_code(&mut tx, code)
            .await?
            .ok_or(CouponError::NotFound)?;
        discount = pricing::coupon_discount(&coupon, subtotal, Utc::now(), pricing.currency)?;
        coupons::increment_usage(&mut tx, coupon.id).await?;
    }

    let totals = pricing::compute_totals(subtotal, discount, pricing);
    let order = orders::insert(
        &mut tx,
        &NewOrder {
            order_number: order_number(user_id, Utc::now()),
            user_id,
            payment_method: request.payment_method,
            subtotal: totals.subtotal,
            tax_amount: totals.tax,
            shipping_amount: totals.shipping,
            discount_amount: totals.discount,
            total_amount: totals.total,
            currency: pricing.currency,
            coupon_code,
            notes: request.notes.clone(),
        },
    )
    .await?;

    let mut order_items = Vec::with_capacity(items.len());
    for item in &items {
        order_items.push(orders::insert_item(&mut tx, order.id, item).await?);
    }
    let address = orders::insert_address(&mut tx, order.id, &request.shipping_address).await?;

    let mut order_payments = Vec::new();
    if request.payment_method == PaymentMethod::Partner {
        order_payments.push(
            payments::create(
                &mut *tx,
                order.id,
                PaymentMethod::Partner,
                order.total_amount,
                order.currency,
                None,
            )
            .await?,
        );
    }

    if request.clear_cart {
        carts::clear(&mut tx, user_id).await?;
    }

    tx.commit().await?;

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total_amount,
        "Order placed"
    );

    Ok(OrderDetail {
        order,
        items: order_items,
        shipping_address: Some(address),
        payments: order_payments,
    })
}

/// Move an order to `status`.
///
/// Cancelling restores stock and fails any payment still waiting on its
/// gateway, so a late success is recorded as owed back rather than paid.
///
/// With `owner` set this is a customer cancellation: only the owner's
/// unpaid order can be cancelled.
///
/// # Errors
///
/// Returns `OrderNotFound`, `InvalidTransition` or `NotCancellable`.
#[instrument(skip(pool))]
pub async fn change_status(
    pool: &PgPool,
    order_id: OrderId,
    status: OrderStatus,
    owner: Option<UserId>,
) -> Result<Order, CheckoutError> {
    let mut tx = pool.begin().await?;

    let order = orders::lock(&mut tx, order_id, owner)
        .await?
        .ok_or(CheckoutError::OrderNotFound)?;

    if owner.is_some() && !order.customer_can_cancel() {
        return Err(CheckoutError::NotCancellable);
    }
    if !order.status.can_transition_to(status) {
        return Err(CheckoutError::InvalidTransition {
            from: order.status,
            to: status,
        });
    }

    if status == OrderStatus::Cancelled {
        orders::restore_stock(&mut tx, order_id).await?;
        let voided = payments::void_pending_for_order(&mut tx, order_id).await?;
        if voided > 0 {
            info!(order_id = %order_id, voided, "Pending payments failed on cancellation");
        }
    }
    let updated = orders::set_status(&mut tx, order_id, status).await?;

    tx.commit().await?;

    info!(order_id = %order_id, from = %order.status, to = %status, "Order status changed");
    Ok(updated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: i32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_merge_lines_combines_duplicates_in_order() {
        let merged = merge_lines(&[line(3, 1), line(1, 2), line(3, 4)]).unwrap();
        assert_eq!(merged, vec![line(3, 5), line(1, 2)]);
    }

    #[test]
    fn test_merge_lines_rejects_empty_and_bad_quantities() {
        assert!(matches!(merge_lines(&[]), Err(CheckoutError::EmptyOrder)));
        assert!(matches!(
            merge_lines(&[line(1, 0)]),
            Err(CheckoutError::InvalidQuantity(id)) if id == ProductId::new(1)
        ));
        assert!(matches!(
            merge_lines(&[line(2, i32::MAX), line(2, 1)]),
            Err(CheckoutError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_order_number_format() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let number = order_number(UserId::new(12), now);

        assert!(number.starts_with("ORD-12-1700000000-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CheckoutError::ProductNotFound(ProductId::new(9)).to_string(),
            "Product 9 not found"
        );
        assert_eq!(
            CheckoutError::InsufficientStock("Desk Lamp".to_string()).to_string(),
            "Insufficient stock for product Desk Lamp"
        );
        assert_eq!(
            CheckoutError::MissingAddressFields(vec!["city", "country"]).to_string(),
            "Missing shipping address fields: city, country"
        );
    }
}
