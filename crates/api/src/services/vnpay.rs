//! VNPay payment gateway: signed payment URLs and callback verification.
//!
//! VNPay signs the sorted `key=value` list of all non-empty `vnp_*`
//! parameters with HMAC-SHA256. Values go into the signed string raw, while
//! the URL itself is form-urlencoded.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::VnpayConfig;

const VERSION: &str = "2.1.0";
const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
/// VNPay timestamps are Vietnam local time (UTC+7).
const GMT7_OFFSET_SECS: i32 = 7 * 3600;

/// VNPay errors.
#[derive(Debug, Error)]
pub enum VnpayError {
    #[error("VNPay is not configured")]
    NotConfigured,
    #[error("missing vnp_SecureHash")]
    MissingSignature,
    #[error("invalid VNPay signature")]
    InvalidSignature,
    #[error("invalid payment amount: {0}")]
    InvalidAmount(Decimal),
    #[error("invalid VNPay URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("HMAC key error")]
    Key,
}

/// Everything needed to build one payment URL.
#[derive(Debug, Clone)]
pub struct PaymentRequest<'a> {
    pub txn_ref: &'a str,
    pub amount: Decimal,
    pub order_info: &'a str,
    pub ip_addr: &'a str,
    pub created_at: DateTime<Utc>,
}

/// VNPay merchant client.
#[derive(Clone)]
pub struct VnpayClient {
    tmn_code: String,
    hash_key: SecretString,
    pay_url: String,
    return_url: String,
}

impl std::fmt::Debug for VnpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnpayClient")
            .field("tmn_code", &self.tmn_code)
            .field("hash_key", &"[REDACTED]")
            .field("pay_url", &self.pay_url)
            .finish_non_exhaustive()
    }
}

impl VnpayClient {
    /// Build a client, or `None` when merchant credentials are absent.
    #[must_use]
    pub fn from_config(config: &VnpayConfig) -> Option<Self> {
        config.is_configured().then(|| Self {
            tmn_code: config.tmn_code.clone(),
            hash_key: config.hash_key.clone(),
            pay_url: config.pay_url.clone(),
            return_url: config.return_url.clone(),
        })
    }

    /// Build the signed redirect URL for a payment.
    ///
    /// # Errors
    ///
    /// Returns `VnpayError::InvalidAmount` for a negative or oversized amount.
    pub fn payment_url(&self, request: &PaymentRequest<'_>) -> Result<String, VnpayError> {
        let amount = to_vnpay_amount(request.amount)?;
        let created = request
            .created_at
            .with_timezone(&gmt7())
            .format("%Y%m%d%H%M%S")
            .to_string();

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let mut set = |k: &str, v: &str| {
            params.insert(k.to_owned(), v.to_owned());
        };
        set("vnp_Version", VERSION);
        set("vnp_Command", "pay");
        set("vnp_TmnCode", &self.tmn_code);
        set("vnp_Amount", &amount.to_string());
        set("vnp_CurrCode", "VND");
        set("vnp_TxnRef", request.txn_ref);
        set("vnp_OrderInfo", request.order_info);
        set("vnp_OrderType", "other");
        set("vnp_Locale", "vn");
        set("vnp_ReturnUrl", &self.return_url);
        set("vnp_CreateDate", &created);
        set("vnp_IpAddr", request.ip_addr);

        let signature = self.sign(&sign_data(&params))?;

        let mut url = Url::parse(&self.pay_url)?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().filter(|(_, v)| !v.is_empty()))
            .append_pair(SECURE_HASH, &signature);
        Ok(url.into())
    }

    /// Verify the signature on a return or IPN callback.
    ///
    /// # Errors
    ///
    /// Returns `MissingSignature` or `InvalidSignature`.
    pub fn verify(&self, params: &BTreeMap<String, String>) -> Result<(), VnpayError> {
        let provided = params
            .get(SECURE_HASH)
            .filter(|s| !s.is_empty())
            .ok_or(VnpayError::MissingSignature)?;

        let signed: BTreeMap<String, String> = params
            .iter()
            .filter(|(k, _)| k.as_str() != SECURE_HASH && k.as_str() != SECURE_HASH_TYPE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let expected = self.sign(&sign_data(&signed))?;
        if !constant_time_compare(&expected, &provided.to_ascii_lowercase()) {
            debug!("VNPay signature mismatch");
            return Err(VnpayError::InvalidSignature);
        }
        Ok(())
    }

    fn sign(&self, data: &str) -> Result<String, VnpayError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.hash_key.expose_secret().as_bytes())
            .map_err(|_| VnpayError::Key)?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// The string VNPay signs: sorted `k=v` pairs with raw values, skipping
/// empty values, joined by `&`.
#[must_use]
pub fn sign_data(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// VNPay expects the amount in hundredths of a dong, as an integer.
///
/// # Errors
///
/// Returns `VnpayError::InvalidAmount` if the amount is negative or does
/// not fit in an `i64`.
pub fn to_vnpay_amount(amount: Decimal) -> Result<i64, VnpayError> {
    if amount.is_sign_negative() {
        return Err(VnpayError::InvalidAmount(amount));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or(VnpayError::InvalidAmount(amount))
}

/// Convert a `vnp_Amount` value back to the order currency unit.
#[must_use]
pub fn from_vnpay_amount(raw: &str) -> Option<Decimal> {
    raw.parse::<i64>()
        .ok()
        .map(|minor| Decimal::from(minor) / Decimal::ONE_HUNDRED)
}

fn gmt7() -> FixedOffset {
    FixedOffset::east_opt(GMT7_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn client() -> VnpayClient {
        VnpayClient {
            tmn_code: "DEMO1234".to_string(),
            hash_key: SecretString::from("SECRETKEYFORTESTS".to_string()),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:3000/payment/return".to_string(),
        }
    }

    /// Sign a callback the way VNPay would.
    pub(crate) fn signed_params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let signature = client().sign(&sign_data(&params)).unwrap();
        params.insert(SECURE_HASH.to_string(), signature);
        params
    }

    #[test]
    fn test_sign_data_sorts_and_skips_empty() {
        let params: BTreeMap<String, String> = [
            ("vnp_TxnRef", "ORDER_1_1"),
            ("vnp_Amount", "10000000"),
            ("vnp_BankCode", ""),
            ("vnp_OrderInfo", "Thanh toan don hang"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(
            sign_data(&params),
            "vnp_Amount=10000000&vnp_OrderInfo=Thanh toan don hang&vnp_TxnRef=ORDER_1_1"
        );
    }

    #[test]
    fn test_hmac_matches_known_vector() {
        // RFC 4231 test case 2.
        let client = VnpayClient {
            hash_key: SecretString::from("Jefe".to_string()),
            ..client()
        };
        assert_eq!(
            client.sign("what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_payment_url_is_signed_and_verifiable() {
        let client = client();
        let created_at = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let url = client
            .payment_url(&PaymentRequest {
                txn_ref: "ORDER_7_1709287200",
                amount: Decimal::from(1_250_000),
                order_info: "Thanh toan don hang #7",
                ip_addr: "203.0.113.9",
                created_at,
            })
            .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let params: BTreeMap<String, String> = parsed.query_pairs().into_owned().collect();

        assert_eq!(params["vnp_Amount"], "125000000");
        assert_eq!(params["vnp_CreateDate"], "20240301170000");
        assert_eq!(params["vnp_OrderInfo"], "Thanh toan don hang #7");
        assert_eq!(params["vnp_Version"], "2.1.0");
        assert!(client.verify(&params).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let client = client();
        let mut params = signed_params(&[
            ("vnp_TxnRef", "ORDER_1_1"),
            ("vnp_Amount", "10000000"),
            ("vnp_ResponseCode", "00"),
        ]);
        assert!(client.verify(&params).is_ok());

        params.insert("vnp_Amount".to_string(), "1".to_string());
        assert!(matches!(client.verify(&params), Err(VnpayError::InvalidSignature)));

        params.remove(SECURE_HASH);
        assert!(matches!(client.verify(&params), Err(VnpayError::MissingSignature)));
    }

    #[test]
    fn test_verify_ignores_hash_type_and_case() {
        let client = client();
        let mut params = signed_params(&[("vnp_TxnRef", "ORDER_1_1"), ("vnp_ResponseCode", "00")]);
        params.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA256".to_string());
        let upper = params[SECURE_HASH].to_uppercase();
        params.insert(SECURE_HASH.to_string(), upper);
        assert!(client.verify(&params).is_ok());
    }

    #[test]
    fn test_amount_conversion() {
        assert_eq!(to_vnpay_amount(Decimal::from(100_000)).unwrap(), 10_000_000);
        assert!(to_vnpay_amount(Decimal::from(-1)).is_err());
        assert_eq!(from_vnpay_amount("10000000"), Some(Decimal::from(100_000)));
        assert_eq!(from_vnpay_amount("abc"), None);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
