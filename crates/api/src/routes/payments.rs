//! VNPay checkout for the signed-in shopper.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use ecom_core::{OrderId, PaymentState, PaymentStatus};

use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RequireUser};
use crate::services::payments::{self, CreatedPayment, PaymentError, Settlement};
use crate::services::vnpay::{VnpayClient, VnpayError};
use crate::state::AppState;

/// Used for `vnp_IpAddr` when the client address is unknown.
const FALLBACK_IP: &str = "127.0.0.1";

/// Build the `/payments` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vnpay/create", post(create_vnpay))
        .route("/vnpay/return", get(vnpay_return))
}

#[derive(Debug, Deserialize)]
pub struct CreateVnpayPayment {
    pub order_id: OrderId,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub order_info: Option<String>,
}

fn vnpay_client(state: &AppState) -> Result<&VnpayClient> {
    state
        .vnpay()
        .ok_or_else(|| PaymentError::Vnpay(VnpayError::NotConfigured).into())
}

/// `POST /payments/vnpay/create`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %form.order_id))]
pub async fn create_vnpay(
    RequireUser(user): RequireUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Json(form): Json<CreateVnpayPayment>,
) -> Result<Json<CreatedPayment>> {
    let vnpay = vnpay_client(&state)?;
    let ip_addr = ip.map_or_else(|| FALLBACK_IP.to_string(), |ip| ip.to_string());

    let created = payments::create_vnpay_payment(
        state.pool(),
        vnpay,
        user.id,
        form.order_id,
        form.amount,
        form.order_info.as_deref(),
        &ip_addr,
    )
    .await?;
    Ok(Json(created))
}

/// `GET /payments/vnpay/return`
///
/// The shopper's browser lands here after paying. Settling is idempotent, so
/// a reload after the IPN has arrived reports the stored outcome.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn vnpay_return(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Value>> {
    let vnpay = vnpay_client(&state)?;
    let settlement = payments::handle_vnpay_return(state.pool(), vnpay, &params).await?;
    Ok(Json(return_body(&settlement)?))
}

fn return_body(settlement: &Settlement) -> Result<Value> {
    let payment = &settlement.payment;
    let body = match payment.status {
        PaymentState::Completed
            if settlement.order.payment_status == PaymentStatus::RefundPending =>
        {
            json!({
                "status": "refund_pending",
                "message": "Order was cancelled; the payment will be refunded",
            })
        }
        PaymentState::Completed => json!({ "status": "success", "message": "Payment successful" }),
        PaymentState::Failed => json!({ "status": "failed", "message": "Payment failed" }),
        PaymentState::Pending => {
            return Err(AppError::Internal(format!(
                "payment {} still pending after return",
                payment.id
            )));
        }
    };
    Ok(body)
}
