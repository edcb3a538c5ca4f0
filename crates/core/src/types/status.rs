//! Status enums for users, orders, payments and coupons.

use serde::{Deserialize, Serialize};

use super::text_enum::text_enum;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    #[serde(alias = "user")]
    Customer,
    /// Back-office operator with access to `/admin` routes.
    Admin,
}

text_enum!(UserRole, "user role" {
    Customer => "customer" | "user",
    Admin => "admin",
});

impl UserRole {
    /// Returns true for roles allowed into the admin API.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Fulfillment lifecycle of an order.
///
/// ```text
/// pending -> confirmed -> shipped -> delivered
///    |           |
///    +-----------+-----> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

text_enum!(OrderStatus, "order status" {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }
}

/// Payment state of an order as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    /// Money arrived after the order was cancelled and must be returned.
    RefundPending,
    Refunded,
}

text_enum!(PaymentStatus, "payment status" {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    RefundPending => "refund_pending",
    Refunded => "refunded",
});

/// State of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Pending,
    Completed,
    Failed,
}

text_enum!(PaymentState, "payment state" {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

impl PaymentState {
    /// A payment is settled once the gateway has reported an outcome.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[serde(alias = "cash_on_delivery")]
    Cod,
    Vnpay,
    BankTransfer,
    /// Settled by a partner system through the partner payment webhook.
    Partner,
}

text_enum!(PaymentMethod, "payment method" {
    Cod => "cod" | "cash_on_delivery",
    Vnpay => "vnpay",
    BankTransfer => "bank_transfer",
    Partner => "partner",
});

/// Discount calculation used by a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// `value` is a percentage of the subtotal.
    Percentage,
    /// `value` is an absolute amount.
    Fixed,
}

text_enum!(CouponKind, "coupon type" {
    Percentage => "percentage",
    Fixed => "fixed",
});
