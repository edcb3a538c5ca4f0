//! Orders, their lines and shipping addresses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ecom_core::{
    CurrencyCode, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    UserId,
};

use super::payment::Payment;

/// An order header.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub order_date: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Customers may cancel until the order ships, as long as nothing was charged.
    #[must_use]
    pub fn customer_can_cancel(&self) -> bool {
        self.status.can_transition_to(OrderStatus::Cancelled)
            && self.payment_status != PaymentStatus::Paid
    }
}

/// A purchased line, priced at the moment of checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Delivery address captured with an order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Names of required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address1", &self.address1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// An order with its lines, as listed to customers and admins.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Everything known about one order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub payments: Vec<Payment>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(15),
            order_number: "ORD-2-1700000000-0A1B".to_string(),
            user_id: UserId::new(2),
            status,
            payment_status,
            payment_method: PaymentMethod::Vnpay,
            subtotal: Decimal::from(150_000),
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::from(150_000),
            currency: CurrencyCode::VND,
            coupon_code: None,
            notes: None,
            order_date: now,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_customer_can_cancel_unpaid_order_before_shipping() {
        assert!(order(OrderStatus::Pending, PaymentStatus::Pending).customer_can_cancel());
        assert!(order(OrderStatus::Confirmed, PaymentStatus::Failed).customer_can_cancel());
        assert!(!order(OrderStatus::Confirmed, PaymentStatus::Paid).customer_can_cancel());
        assert!(!order(OrderStatus::Shipped, PaymentStatus::Pending).customer_can_cancel());
        assert!(
            !order(OrderStatus::Cancelled, PaymentStatus::RefundPending).customer_can_cancel()
        );
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "An".to_string(),
            last_name: "Nguyen".to_string(),
            company: None,
            address1: "1 Le Loi".to_string(),
            address2: None,
            city: "Ho Chi Minh City".to_string(),
            state: None,
            postal_code: "700000".to_string(),
            country: "VN".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_complete_address_has_no_missing_fields() {
        assert!(address().missing_fields().is_empty());
    }

    #[test]
    fn test_blank_fields_are_reported() {
        let mut addr = address();
        addr.city = "  ".to_string();
        addr.postal_code = String::new();
        assert_eq!(addr.missing_fields(), vec!["city", "postal_code"]);
    }
}
