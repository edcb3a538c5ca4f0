//! Payment attempts against orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use ecom_core::{CurrencyCode, OrderId, PaymentId, PaymentMethod, PaymentState};

/// One attempt to pay for an order through a gateway or partner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub status: PaymentState,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub transaction_id: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Whether a gateway report may still change this payment.
    ///
    /// Pending payments are open, and so are payments failed by an order
    /// cancellation before the gateway answered (no gateway response yet).
    #[must_use]
    pub fn is_open_for_settlement(&self) -> bool {
        match self.status {
            PaymentState::Pending => true,
            PaymentState::Failed => self.gateway_response.is_none(),
            PaymentState::Completed => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn payment(status: PaymentState) -> Payment {
        let now = Utc::now();
        Payment {
            id: PaymentId::new(4),
            order_id: OrderId::new(15),
            payment_method: PaymentMethod::Vnpay,
            status,
            amount: Decimal::from(150_000),
            currency: CurrencyCode::VND,
            transaction_id: Some("ORDER_15_1709287200".to_string()),
            gateway_response: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pending_and_voided_payments_stay_open() {
        assert!(payment(PaymentState::Pending).is_open_for_settlement());
        assert!(payment(PaymentState::Failed).is_open_for_settlement());
    }

    #[test]
    fn test_reported_payments_are_closed() {
        assert!(!payment(PaymentState::Completed).is_open_for_settlement());

        let mut declined = payment(PaymentState::Failed);
        declined.gateway_response = Some(serde_json::json!({"vnp_ResponseCode": "24"}));
        assert!(!declined.is_open_for_settlement());
    }
}
