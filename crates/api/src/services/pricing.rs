//! Order totals and coupon discounts.
//!
//! Everything here is pure so checkout and the coupon preview endpoint agree
//! on the numbers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use ecom_core::{CouponKind, CurrencyCode};

use crate::config::PricingConfig;
use crate::models::Coupon;

/// Reasons a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not yet valid")]
    NotStarted,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("Order subtotal must be at least {0}")]
    MinimumNotMet(Decimal),
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Discount a coupon grants on `subtotal` at time `now`.
///
/// # Errors
///
/// Returns the first rule the coupon breaks.
pub fn coupon_discount(
    coupon: &Coupon,
    subtotal: Decimal,
    now: DateTime<Utc>,
    currency: CurrencyCode,
) -> Result<Decimal, CouponError> {
    if !coupon.is_active {
        return Err(CouponError::Inactive);
    }
    if now < coupon.start_date {
        return Err(CouponError::NotStarted);
    }
    if now > coupon.end_date {
        return Err(CouponError::Expired);
    }
    if coupon.usage_limit.is_some_and(|limit| coupon.used_count >= limit) {
        return Err(CouponError::UsageLimitReached);
    }
    if let Some(minimum) = coupon.minimum_amount
        && subtotal < minimum
    {
        return Err(CouponError::MinimumNotMet(minimum));
    }

    let discount = match coupon.kind {
        CouponKind::Percentage => {
            let raw = subtotal * coupon.value / Decimal::ONE_HUNDRED;
            coupon.maximum_discount.map_or(raw, |cap| raw.min(cap))
        }
        CouponKind::Fixed => coupon.value,
    };

    Ok(currency.round(discount.min(subtotal).max(Decimal::ZERO)))
}

/// Compute tax, shipping and total for a subtotal and discount.
#[must_use]
pub fn compute_totals(subtotal: Decimal, discount: Decimal, pricing: &PricingConfig) -> Totals {
    let currency = pricing.currency;
    let subtotal = currency.round(subtotal);
    let discount = currency.round(discount.min(subtotal));
    let taxable = subtotal - discount;
    let tax = currency.round(taxable * pricing.tax_rate);

    let free_shipping = pricing
        .free_shipping_threshold
        .is_some_and(|threshold| subtotal >= threshold);
    let shipping = if free_shipping || subtotal.is_zero() {
        Decimal::ZERO
    } else {
        currency.round(pricing.shipping_cost)
    };

    Totals {
        subtotal,
        discount,
        tax,
        shipping,
        total: taxable + tax + shipping,
    }
}
