//! Payment creation and settlement.
//!
//! A payment is settled at most once: the first callback that finds it open
//! decides the outcome, later callbacks see it as already processed.
//! A successful payment marks the order `paid` and confirms it, unless the
//! order was cancelled first. Then the money is recorded and the order is
//! flagged `refund_pending` instead.
//!
//! Settlement locks the order row before the payment row, the same order
//! cancellation uses, so the two never deadlock.

use std::collections::BTreeMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument, warn};

use ecom_core::{
    OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentState, PaymentStatus, UserId,
};

use crate::db::{RepositoryError, orders, payments};
use crate::models::{Order, Partner, Payment};
use crate::services::vnpay::{
    PaymentRequest, VnpayClient, VnpayError, constant_time_compare, from_vnpay_amount,
};

/// VNPay response code for a successful payment.
const VNPAY_SUCCESS: &str = "00";

/// Payment errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("Order payment already processed")]
    AlreadyProcessed,

    #[error("Order has been cancelled")]
    OrderCancelled,

    #[error("Payment amount does not match order total")]
    AmountMismatch,

    #[error("Invalid partner signature")]
    InvalidPartnerSignature,

    #[error(transparent)]
    Vnpay(#[from] VnpayError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// A freshly created gateway payment.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPayment {
    pub payment_url: String,
    pub payment_id: PaymentId,
}

/// Gateway reference for a new VNPay payment: `ORDER_{order_id}_{unix}`.
#[must_use]
pub fn vnpay_txn_ref(order_id: OrderId, unix_seconds: i64) -> String {
    format!("ORDER_{order_id}_{unix_seconds}")
}

/// Start a VNPay payment for one of the caller's orders.
///
/// # Errors
///
/// Returns `OrderNotFound`, `AlreadyProcessed`, `OrderCancelled` or
/// `AmountMismatch` when the order cannot be paid.
#[instrument(skip(pool, vnpay, order_info))]
pub async fn create_vnpay_payment(
    pool: &PgPool,
    vnpay: &VnpayClient,
    user_id: UserId,
    order_id: OrderId,
    amount: Option<Decimal>,
    order_info: Option<&str>,
    ip_addr: &str,
) -> Result<CreatedPayment, PaymentError> {
    let order = orders::get(pool, order_id, Some(user_id))
        .await?
        .ok_or(PaymentError::OrderNotFound)?;

    if order.payment_status != PaymentStatus::Pending {
        return Err(PaymentError::AlreadyProcessed);
    }
    if order.status == OrderStatus::Cancelled {
        return Err(PaymentError::OrderCancelled);
    }
    if amount.is_some_and(|a| a != order.total_amount) {
        return Err(PaymentError::AmountMismatch);
    }

    let now = Utc::now();
    let txn_ref = vnpay_txn_ref(order.id, now.timestamp());
    let default_info = format!("Thanh toan don hang {}", order.order_number);
    let order_info = order_info
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&default_info);

    let payment_url = vnpay.payment_url(&PaymentRequest {
        txn_ref: &txn_ref,
        amount: order.total_amount,
        order_info,
        ip_addr,
        created_at: now,
    })?;

    let payment = payments::create(
        pool,
        order.id,
        PaymentMethod::Vnpay,
        order.total_amount,
        order.currency,
        Some(&txn_ref),
    )
    .await?;

    info!(payment_id = %payment.id, txn_ref = %txn_ref, "VNPay payment created");
    Ok(CreatedPayment {
        payment_url,
        payment_id: payment.id,
    })
}

/// A payment after a callback, with its order.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment: Payment,
    pub order: Order,
}

/// The order payment status a gateway outcome leads to, if any.
///
/// Failures leave the order alone so the shopper can retry. Money that
/// arrives for a cancelled order is owed back to the shopper.
#[must_use]
pub fn order_payment_status_after(
    order_status: OrderStatus,
    success: bool,
) -> Option<PaymentStatus> {
    match (success, order_status) {
        (false, _) => None,
        (true, OrderStatus::Cancelled) => Some(PaymentStatus::RefundPending),
        (true, _) => Some(PaymentStatus::Paid),
    }
}

/// Lock the payment's order, then the payment itself.
///
/// Returns `None` when the order has been deleted.
async fn lock_for_settlement(
    conn: &mut PgConnection,
    found: &Payment,
) -> Result<Option<(Order, Payment)>, RepositoryError> {
    let Some(order) = orders::lock(&mut *conn, found.order_id, None).await? else {
        return Ok(None);
    };
    let payment = payments::lock(&mut *conn, found.id).await?;
    Ok(Some((order, payment)))
}

/// Record an outcome on a locked payment. Payments that are no longer open
/// are returned unchanged.
async fn apply_outcome(
    conn: &mut PgConnection,
    order: Order,
    payment: Payment,
    success: bool,
    transaction_id: Option<&str>,
    gateway_response: &serde_json::Value,
) -> Result<Settlement, RepositoryError> {
    if !payment.is_open_for_settlement() {
        return Ok(Settlement { payment, order });
    }

    let state = if success {
        PaymentState::Completed
    } else {
        PaymentState::Failed
    };
    let payment =
        payments::settle(&mut *conn, payment.id, state, transaction_id, gateway_response).await?;

    let order = match order_payment_status_after(order.status, success) {
        Some(PaymentStatus::RefundPending) => {
            warn!(
                payment_id = %payment.id,
                order_id = %order.id,
                "Payment completed for a cancelled order, refund required"
            );
            orders::set_payment_status(&mut *conn, order.id, PaymentStatus::RefundPending).await?
        }
        Some(status) => orders::set_payment_status(&mut *conn, order.id, status).await?,
        None => order,
    };

    info!(
        payment_id = %payment.id,
        order_id = %order.id,
        status = %payment.status,
        order_payment_status = %order.payment_status,
        "Payment settled"
    );
    Ok(Settlement { payment, order })
}

fn params_json(params: &BTreeMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

/// Handle the shopper's browser return from VNPay.
///
/// # Errors
///
/// Returns `Vnpay(InvalidSignature)` for a forged query and
/// `PaymentNotFound` for an unknown transaction reference.
#[instrument(skip_all)]
pub async fn handle_vnpay_return(
    pool: &PgPool,
    vnpay: &VnpayClient,
    params: &BTreeMap<String, String>,
) -> Result<Settlement, PaymentError> {
    vnpay.verify(params)?;

    let txn_ref = params
        .get("vnp_TxnRef")
        .ok_or(PaymentError::PaymentNotFound)?;
    let success = params.get("vnp_ResponseCode").map(String::as_str) == Some(VNPAY_SUCCESS);

    let mut tx = pool.begin().await?;
    let found = payments::find_by_transaction(&mut tx, txn_ref)
        .await?
        .ok_or(PaymentError::PaymentNotFound)?;
    let (order, payment) = lock_for_settlement(&mut tx, &found)
        .await?
        .ok_or(PaymentError::PaymentNotFound)?;
    let settlement =
        apply_outcome(&mut tx, order, payment, success, None, &params_json(params)).await?;
    tx.commit().await?;

    Ok(settlement)
}

/// Body VNPay expects in reply to an IPN call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnResponse {
    const fn new(rsp_code: &'static str, message: &'static str) -> Self {
        Self { rsp_code, message }
    }
}

/// Process a VNPay IPN (server-to-server notification).
///
/// Never fails: every outcome maps to a VNPay response code.
#[instrument(skip_all, fields(txn_ref = params.get("vnp_TxnRef").map(String::as_str)))]
pub async fn process_ipn(
    pool: &PgPool,
    vnpay: Option<&VnpayClient>,
    params: &BTreeMap<String, String>,
) -> IpnResponse {
    let Some(vnpay) = vnpay else {
        warn!("VNPay IPN received but VNPay is not configured");
        return IpnResponse::new("99", "Unknown error");
    };
    if vnpay.verify(params).is_err() {
        return IpnResponse::new("97", "Invalid signature");
    }

    match settle_ipn(pool, params).await {
        Ok(response) => response,
        Err(err) => {
            let event_id = sentry::capture_error(&err);
            tracing::error!(error = %err, sentry_event_id = %event_id, "IPN processing failed");
            IpnResponse::new("99", "Unknown error")
        }
    }
}

/// Whether an IPN reports a completed payment.
fn ipn_success(params: &BTreeMap<String, String>) -> bool {
    params.get("vnp_ResponseCode").map(String::as_str) == Some(VNPAY_SUCCESS)
        && params
            .get("vnp_TransactionStatus")
            .is_none_or(|s| s == VNPAY_SUCCESS)
}

/// Reply early when the IPN must not touch a locked payment.
fn ipn_rejection(payment: &Payment, params: &BTreeMap<String, String>) -> Option<IpnResponse> {
    let amount = params.get("vnp_Amount").and_then(|a| from_vnpay_amount(a));
    if amount != Some(payment.amount) {
        return Some(IpnResponse::new("04", "Invalid amount"));
    }
    if !payment.is_open_for_settlement() {
        return Some(IpnResponse::new("02", "Order already confirmed"));
    }
    None
}

async fn settle_ipn(
    pool: &PgPool,
    params: &BTreeMap<String, String>,
) -> Result<IpnResponse, RepositoryError> {
    const NOT_FOUND: IpnResponse = IpnResponse::new("01", "Order not found");

    let Some(txn_ref) = params.get("vnp_TxnRef") else {
        return Ok(NOT_FOUND);
    };

    let mut tx = pool.begin().await?;
    let Some(found) = payments::find_by_transaction(&mut tx, txn_ref).await? else {
        return Ok(NOT_FOUND);
    };
    let Some((order, payment)) = lock_for_settlement(&mut tx, &found).await? else {
        return Ok(NOT_FOUND);
    };

    if let Some(rejection) = ipn_rejection(&payment, params) {
        return Ok(rejection);
    }

    apply_outcome(
        &mut tx,
        order,
        payment,
        ipn_success(params),
        None,
        &params_json(params),
    )
    .await?;
    tx.commit().await?;

    Ok(IpnResponse::new("00", "Confirm Success"))
}

/// Payment result pushed by a partner system.
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerPaymentNotice {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub status: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    pub transaction_id: String,
    pub signature: String,
}

impl PartnerPaymentNotice {
    /// The string the partner signs.
    #[must_use]
    pub fn signing_payload(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.order_id,
            self.payment_id,
            self.status,
            self.amount.normalize(),
            self.transaction_id
        )
    }
}

/// Hex HMAC-SHA256 of `payload` under a partner's secret key.
///
/// # Errors
///
/// Returns `InvalidPartnerSignature` if the key cannot be used.
pub fn partner_signature(secret_key: &str, payload: &str) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .map_err(|_| PaymentError::InvalidPartnerSignature)?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Apply a partner payment notification.
///
/// Only `partner` payments on orders containing one of the partner's
/// products can be settled; anything else is reported as not found.
///
/// # Errors
///
/// Returns `InvalidPartnerSignature`, `PaymentNotFound` or `AmountMismatch`.
#[instrument(skip(pool, partner, notice), fields(partner_id = %partner.id, payment_id = %notice.payment_id))]
pub async fn handle_partner_payment(
    pool: &PgPool,
    partner: &Partner,
    notice: &PartnerPaymentNotice,
) -> Result<Settlement, PaymentError> {
    let expected = partner_signature(&partner.secret_key, &notice.signing_payload())?;
    if !constant_time_compare(&expected, &notice.signature.to_ascii_lowercase()) {
        return Err(PaymentError::InvalidPartnerSignature);
    }

    let mut tx = pool.begin().await?;
    let found =
        payments::find_for_partner(&mut tx, notice.payment_id, notice.order_id, partner.id)
            .await?
            .ok_or(PaymentError::PaymentNotFound)?;
    let (order, payment) = lock_for_settlement(&mut tx, &found)
        .await?
        .ok_or(PaymentError::PaymentNotFound)?;

    if payment.amount != notice.amount {
        return Err(PaymentError::AmountMismatch);
    }

    let response = serde_json::json!({
        "partner_id": partner.id,
        "status": notice.status,
        "amount": notice.amount,
        "currency": notice.currency,
        "transaction_id": notice.transaction_id,
    });
    let settlement = apply_outcome(
        &mut tx,
        order,
        payment,
        notice.status == "completed",
        Some(&notice.transaction_id),
        &response,
    )
    .await?;
    tx.commit().await?;

    Ok(settlement)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ecom_core::{Email, PartnerId};

    use super::*;
    use crate::config::test_config;
    use crate::models::payment::tests::payment;
    use crate::services::vnpay::tests::client;
    use crate::state::tests::lazy_state;

    fn ipn_params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn partner() -> Partner {
        let now = Utc::now();
        Partner {
            id: PartnerId::new(3),
            name: "Acme".to_string(),
            email: Email::parse("ops@acme.test").unwrap(),
            api_key: "ak_123".to_string(),
            secret_key: "partner-secret".to_string(),
            webhook_url: None,
            is_active: true,
            commission_rate: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    fn notice() -> PartnerPaymentNotice {
        PartnerPaymentNotice {
            order_id: OrderId::new(15),
            payment_id: PaymentId::new(4),
            status: "completed".to_string(),
            amount: Decimal::new(15_000_000, 2),
            currency: Some("VND".to_string()),
            transaction_id: "TX-991".to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_signing_payload_normalizes_amount() {
        assert_eq!(notice().signing_payload(), "15:4:completed:150000:TX-991");
    }

    #[test]
    fn test_partner_signature_is_hex_hmac() {
        let sig = partner_signature("partner-secret", "15:4:completed:150000:TX-991").unwrap();
        assert_eq!(sig.len(), 64);
        assert_eq!(
            sig,
            partner_signature("partner-secret", "15:4:completed:150000:TX-991").unwrap()
        );
        assert_ne!(
            sig,
            partner_signature("other-secret", "15:4:completed:150000:TX-991").unwrap()
        );
    }

    #[test]
    fn test_txn_ref_format() {
        assert_eq!(vnpay_txn_ref(OrderId::new(7), 1_709_287_200), "ORDER_7_1709287200");
    }

    #[test]
    fn test_success_on_live_order_marks_it_paid() {
        for status in [OrderStatus::Pending, OrderStatus::Confirmed] {
            assert_eq!(
                order_payment_status_after(status, true),
                Some(PaymentStatus::Paid)
            );
        }
    }

    #[test]
    fn test_success_on_cancelled_order_flags_refund() {
        assert_eq!(
            order_payment_status_after(OrderStatus::Cancelled, true),
            Some(PaymentStatus::RefundPending)
        );
    }

    #[test]
    fn test_failure_leaves_order_payment_status() {
        assert_eq!(order_payment_status_after(OrderStatus::Pending, false), None);
        assert_eq!(order_payment_status_after(OrderStatus::Cancelled, false), None);
    }

    #[test]
    fn test_ipn_success_requires_both_codes() {
        assert!(ipn_success(&ipn_params(&[("vnp_ResponseCode", "00")])));
        assert!(ipn_success(&ipn_params(&[
            ("vnp_ResponseCode", "00"),
            ("vnp_TransactionStatus", "00"),
        ])));
        assert!(!ipn_success(&ipn_params(&[
            ("vnp_ResponseCode", "00"),
            ("vnp_TransactionStatus", "02"),
        ])));
        assert!(!ipn_success(&ipn_params(&[("vnp_ResponseCode", "24")])));
        assert!(!ipn_success(&ipn_params(&[])));
    }

    #[test]
    fn test_ipn_rejects_wrong_amount() {
        // 150,000 VND is sent as 15000000
        let open = payment(PaymentState::Pending);
        let short = ipn_params(&[("vnp_Amount", "14999900")]);
        assert_eq!(ipn_rejection(&open, &short).unwrap().rsp_code, "04");
        assert_eq!(ipn_rejection(&open, &ipn_params(&[])).unwrap().rsp_code, "04");
    }

    #[test]
    fn test_ipn_reports_already_confirmed_payments() {
        let amount = ipn_params(&[("vnp_Amount", "15000000")]);
        let completed = payment(PaymentState::Completed);
        assert_eq!(ipn_rejection(&completed, &amount).unwrap().rsp_code, "02");

        let mut declined = payment(PaymentState::Failed);
        declined.gateway_response = Some(serde_json::json!({"vnp_ResponseCode": "24"}));
        assert_eq!(ipn_rejection(&declined, &amount).unwrap().rsp_code, "02");
    }

    #[test]
    fn test_ipn_settles_open_payments() {
        let amount = ipn_params(&[("vnp_Amount", "15000000")]);
        assert!(ipn_rejection(&payment(PaymentState::Pending), &amount).is_none());
        // Voided by a cancellation, still waiting for the gateway
        assert!(ipn_rejection(&payment(PaymentState::Failed), &amount).is_none());
    }

    #[tokio::test]
    async fn test_ipn_without_vnpay_is_unknown_error() {
        let state = lazy_state(test_config());
        let params = ipn_params(&[("vnp_TxnRef", "ORDER_1_1"), ("vnp_SecureHash", "ab")]);

        let response = process_ipn(state.pool(), None, &params).await;
        assert_eq!(response, IpnResponse::new("99", "Unknown error"));
    }

    #[tokio::test]
    async fn test_ipn_with_bad_signature_is_rejected() {
        let state = lazy_state(test_config());
        let vnpay = client();

        let forged = ipn_params(&[
            ("vnp_TxnRef", "ORDER_1_1"),
            ("vnp_Amount", "15000000"),
            ("vnp_ResponseCode", "00"),
            ("vnp_SecureHash", &"0".repeat(64)),
        ]);
        let response = process_ipn(state.pool(), Some(&vnpay), &forged).await;
        assert_eq!(response, IpnResponse::new("97", "Invalid signature"));

        let unsigned = ipn_params(&[("vnp_TxnRef", "ORDER_1_1")]);
        let response = process_ipn(state.pool(), Some(&vnpay), &unsigned).await;
        assert_eq!(response.rsp_code, "97");
    }

    #[tokio::test]
    async fn test_return_with_bad_signature_is_rejected() {
        let state = lazy_state(test_config());
        let params = ipn_params(&[
            ("vnp_TxnRef", "ORDER_1_1"),
            ("vnp_ResponseCode", "00"),
            ("vnp_SecureHash", &"0".repeat(64)),
        ]);

        let err = handle_vnpay_return(state.pool(), &client(), &params)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Vnpay(VnpayError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_partner_notice_with_bad_signature_is_rejected() {
        let state = lazy_state(test_config());
        let mut forged = notice();
        forged.signature = partner_signature("other-secret", &forged.signing_payload()).unwrap();

        let err = handle_partner_payment(state.pool(), &partner(), &forged)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPartnerSignature));
    }

    #[test]
    fn test_ipn_response_serializes_vnpay_field_names() {
        let json = serde_json::to_value(IpnResponse::new("00", "Confirm Success")).unwrap();
        assert_eq!(json, serde_json::json!({"RspCode": "00", "Message": "Confirm Success"}));
    }
}
