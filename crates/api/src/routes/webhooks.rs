//! Inbound payment notifications: VNPay IPN and partner callbacks.
//!
//! VNPay expects HTTP 200 with `{RspCode, Message}` for every IPN, so the
//! local IPN handlers never return an error status.

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::middleware::RequirePartner;
use crate::services::payments::{self, IpnResponse, PartnerPaymentNotice};
use crate::services::webhook_proxy::{self, LambdaEvent, LambdaResponse};
use crate::state::AppState;

/// Build the `/webhooks` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vnpay", get(vnpay_ipn).post(vnpay_ipn))
        .route("/vnpay/direct", get(vnpay_ipn_direct).post(vnpay_ipn_direct))
        .route("/partner/payment", post(partner_payment))
}

/// Collect VNPay parameters from the query string and a form body.
///
/// Body values win over query values with the same key.
fn ipn_params(uri: &Uri, body: &[u8]) -> BTreeMap<String, String> {
    let query = uri.query().unwrap_or_default().as_bytes();
    url::form_urlencoded::parse(query)
        .chain(url::form_urlencoded::parse(body))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// `GET|POST /webhooks/vnpay`
///
/// Forwarded to the configured function when the proxy is enabled,
/// otherwise handled in-process.
#[instrument(skip_all, fields(path = %uri.path()))]
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    if let Some(target) = state.config().webhook_proxy.target() {
        let event = LambdaEvent::new(
            method.as_str(),
            uri.path(),
            uri.query()
                .map(|q| {
                    url::form_urlencoded::parse(q.as_bytes())
                        .into_owned()
                        .collect::<HashMap<_, _>>()
                })
                .unwrap_or_default(),
            header_map(&headers),
            &body,
        );
        let reply = webhook_proxy::forward(state.http(), target, &event).await?;
        return Ok(replay(reply));
    }

    let params = ipn_params(&uri, &body);
    Ok(Json(payments::process_ipn(state.pool(), state.vnpay(), &params).await).into_response())
}

/// `GET|POST /webhooks/vnpay/direct`
///
/// Always handled in-process, even with the proxy enabled.
#[instrument(skip_all)]
pub async fn vnpay_ipn_direct(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Json<IpnResponse> {
    let params = ipn_params(&uri, &body);
    Json(payments::process_ipn(state.pool(), state.vnpay(), &params).await)
}

/// `POST /webhooks/partner/payment`
#[instrument(skip_all, fields(partner_id = %partner.id, order_id = %notice.order_id))]
pub async fn partner_payment(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
    Json(notice): Json<PartnerPaymentNotice>,
) -> Result<Json<Value>> {
    let settlement = payments::handle_partner_payment(state.pool(), &partner, &notice).await?;
    info!(
        payment_id = %settlement.payment.id,
        status = %settlement.payment.status,
        "Partner payment processed"
    );
    Ok(Json(json!({
        "status": "success",
        "message": "Payment status updated",
        "payment_status": settlement.payment.status,
        "order_payment_status": settlement.order.payment_status,
    })))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect()
}

/// Turn the function's reply into our response.
fn replay(reply: LambdaResponse) -> Response {
    let status = StatusCode::from_u16(reply.status_code).unwrap_or_else(|_| {
        warn!(status = reply.status_code, "Lambda returned an invalid status code");
        StatusCode::BAD_GATEWAY
    });

    let mut headers = HeaderMap::new();
    for (name, value) in &reply.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    (status, headers, reply.body).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ipn_params_merges_query_and_body() {
        let uri: Uri = "/api/v1/webhooks/vnpay?vnp_TxnRef=ORDER_1_1&vnp_Amount=100"
            .parse()
            .unwrap();
        let params = ipn_params(&uri, b"vnp_Amount=200&vnp_OrderInfo=Thanh+toan");

        assert_eq!(params["vnp_TxnRef"], "ORDER_1_1");
        assert_eq!(params["vnp_Amount"], "200");
        assert_eq!(params["vnp_OrderInfo"], "Thanh toan");
    }

    #[test]
    fn test_replay_copies_status_headers_and_body() {
        let reply = LambdaResponse {
            status_code: 200,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: r#"{"RspCode":"00"}"#.to_string(),
        };
        let response = replay(reply);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_replay_rejects_bogus_status() {
        let reply = LambdaResponse {
            status_code: 42,
            headers: HashMap::new(),
            body: String::new(),
        };
        assert_eq!(replay(reply).status(), StatusCode::BAD_GATEWAY);
    }
}
