//! End-to-end tests for the ecom API.
//!
//! The tests talk to a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! ```bash
//! ecom-cli migrate run && ecom-cli seed
//! cargo run -p ecom-api &
//! API_BASE_URL=http://localhost:8080 cargo test -p ecom-integration-tests -- --ignored
//! ```
//!
//! `ADMIN_EMAIL` / `ADMIN_PASSWORD` default to the seeded admin account.
//! Signed VNPay callbacks are only exercised when `VNPAY_HASH_KEY` holds
//! the server's merchant secret.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sha2::Sha256;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

/// URL for a path under `/api/v1`.
#[must_use]
pub fn api_url(path: &str) -> String {
    format!("{}/api/v1{path}", base_url())
}

/// An HTTP client plus the tokens of the signed-in user.
pub struct Session {
    pub client: Client,
    pub access_token: String,
    pub refresh_token: String,
    pub user: Value,
}

impl Session {
    /// Register a fresh customer with a unique email.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the registration.
    pub async fn register_customer() -> Self {
        let email = format!("it-{}@example.com", uuid::Uuid::new_v4().simple());
        let client = Client::new();
        let resp = client
            .post(api_url("/auth/register"))
            .json(&json!({
                "email": email,
                "password": "integration-pass",
                "first_name": "Integration",
                "last_name": "Test",
            }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(resp.status(), StatusCode::CREATED);
        Self::from_body(client, resp.json().await.expect("Invalid auth body"))
    }

    /// Sign in as the seeded admin.
    ///
    /// # Panics
    ///
    /// Panics if the admin cannot log in.
    pub async fn admin() -> Self {
        let email =
            std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@ecommerce.com".to_string());
        let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
        let client = Client::new();
        let resp = client
            .post(api_url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to log in");
        assert_eq!(resp.status(), StatusCode::OK);
        Self::from_body(client, resp.json().await.expect("Invalid auth body"))
    }

    fn from_body(client: Client, body: Value) -> Self {
        Self {
            client,
            access_token: body["access_token"].as_str().unwrap_or_default().to_string(),
            refresh_token: body["refresh_token"].as_str().unwrap_or_default().to_string(),
            user: body["user"].clone(),
        }
    }

    /// Authenticated GET.
    #[must_use]
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(api_url(path))
            .bearer_auth(&self.access_token)
    }

    /// Authenticated POST.
    #[must_use]
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(api_url(path))
            .bearer_auth(&self.access_token)
    }

    /// Authenticated DELETE.
    #[must_use]
    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(api_url(path))
            .bearer_auth(&self.access_token)
    }

    /// Place an order for `quantity` of one product.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent or the body is not JSON.
    pub async fn place_order(
        &self,
        product_id: &Value,
        quantity: i64,
        payment_method: &str,
    ) -> (StatusCode, Value) {
        let resp = self
            .post("/orders")
            .json(&json!({
                "items": [{ "product_id": product_id, "quantity": quantity }],
                "shipping_address": shipping_address(),
                "payment_method": payment_method,
            }))
            .send()
            .await
            .expect("Failed to place order");
        let status = resp.status();
        (status, resp.json().await.expect("Invalid order body"))
    }

    /// Fetch one of the caller's orders with its payments.
    ///
    /// # Panics
    ///
    /// Panics unless the server returns the order.
    pub async fn order(&self, order_id: &Value) -> Value {
        let resp = self
            .get(&format!("/orders/{order_id}"))
            .send()
            .await
            .expect("Failed to get order");
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.expect("Invalid order body")
    }

    /// Create an active product as admin with a unique SKU.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the product.
    pub async fn create_product(&self, stock: i64) -> Value {
        let sku = format!("IT-{}", uuid::Uuid::new_v4().simple());
        let resp = self
            .post("/admin/products")
            .json(&json!({
                "name": format!("Integration {sku}"),
                "price": "150000",
                "sku": sku,
                "stock": stock,
            }))
            .send()
            .await
            .expect("Failed to create product");
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.expect("Invalid product body")
    }
}

/// A complete shipping address for checkout requests.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "first_name": "Integration",
        "last_name": "Test",
        "address1": "1 Test Street",
        "city": "Hanoi",
        "postal_code": "100000",
        "country": "VN",
        "phone": "0900000000",
    })
}

/// A partner created through the admin API, with its credentials.
pub struct PartnerAccount {
    pub client: Client,
    pub id: Value,
    pub api_key: String,
    pub secret_key: String,
}

impl PartnerAccount {
    /// Create a partner as `admin`.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the partner.
    pub async fn create(admin: &Session) -> Self {
        let tag = uuid::Uuid::new_v4().simple();
        let resp = admin
            .post("/admin/partners")
            .json(&json!({
                "name": format!("Partner {tag}"),
                "email": format!("partner-{tag}@example.com"),
            }))
            .send()
            .await
            .expect("Failed to create partner");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.expect("Invalid partner body");
        Self {
            client: Client::new(),
            id: body["id"].clone(),
            api_key: body["api_key"].as_str().unwrap_or_default().to_string(),
            secret_key: body["secret_key"].as_str().unwrap_or_default().to_string(),
        }
    }

    /// POST with partner key headers.
    #[must_use]
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(api_url(path))
            .header("X-API-Key", &self.api_key)
            .header("X-Secret-Key", &self.secret_key)
    }

    /// A signed payment notice in the shape of the partner payment webhook.
    #[must_use]
    pub fn payment_notice(
        &self,
        order_id: &Value,
        payment_id: &Value,
        status: &str,
        amount: &Value,
        transaction_id: &str,
    ) -> Value {
        let payload = format!(
            "{order_id}:{payment_id}:{status}:{}:{transaction_id}",
            normalized_amount(amount)
        );
        json!({
            "order_id": order_id,
            "payment_id": payment_id,
            "status": status,
            "amount": amount,
            "currency": "VND",
            "transaction_id": transaction_id,
            "signature": hmac_hex(&self.secret_key, &payload),
        })
    }
}

/// Hex HMAC-SHA256, the signature both VNPay and partners use here.
#[must_use]
pub fn hmac_hex(secret: &str, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Split a decimal amount as rendered in JSON into whole and fraction digits.
fn amount_parts(amount: &Value) -> (String, String) {
    let raw = amount
        .as_str()
        .map_or_else(|| amount.to_string(), str::to_string);
    let (whole, frac) = raw.split_once('.').unwrap_or((raw.as_str(), ""));
    (whole.to_string(), frac.to_string())
}

/// Amount without trailing fractional zeros: `"150000.00"` becomes `"150000"`.
#[must_use]
pub fn normalized_amount(amount: &Value) -> String {
    let (whole, frac) = amount_parts(amount);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole
    } else {
        format!("{whole}.{frac}")
    }
}

/// `vnp_Amount` for an order total: hundredths, as an integer.
#[must_use]
pub fn vnpay_amount(amount: &Value) -> String {
    let (whole, frac) = amount_parts(amount);
    let cents: String = frac.chars().chain("00".chars()).take(2).collect();
    let digits = format!("{whole}{cents}");
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sign VNPay callback parameters with the merchant secret, if known.
///
/// Returns `None` when `VNPAY_HASH_KEY` is unset.
#[must_use]
pub fn sign_vnpay(mut params: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    let secret = std::env::var("VNPAY_HASH_KEY").ok()?;
    let data = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    params.insert("vnp_SecureHash".to_string(), hmac_hex(&secret, &data));
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formats() {
        assert_eq!(normalized_amount(&json!("150000.00")), "150000");
        assert_eq!(normalized_amount(&json!("99.50")), "99.5");
        assert_eq!(vnpay_amount(&json!("150000.00")), "15000000");
        assert_eq!(vnpay_amount(&json!("99.5")), "9950");
        assert_eq!(vnpay_amount(&json!(120)), "12000");
    }
}
