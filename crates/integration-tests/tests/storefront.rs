//! Catalog, cart and checkout against a running, seeded server.
//!
//! Run with: `cargo test -p ecom-integration-tests -- --ignored`

use std::collections::BTreeMap;

use ecom_integration_tests::{PartnerAccount, Session, api_url, sign_vnpay, vnpay_amount};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn product_stock(client: &Client, product_id: &Value) -> i64 {
    let resp = client
        .get(api_url(&format!("/products/{product_id}")))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    body["stock"].as_i64().expect("Product has no stock field")
}

/// Start a VNPay payment and return its gateway transaction reference.
///
/// `None` when the server has no VNPay merchant configured.
async fn start_vnpay_payment(session: &Session, order_id: &Value) -> Option<String> {
    let resp = session
        .post("/payments/vnpay/create")
        .json(&json!({ "order_id": order_id }))
        .send()
        .await
        .expect("Failed to create payment");
    if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    let url = reqwest::Url::parse(body["payment_url"].as_str().expect("No payment_url"))
        .expect("Invalid payment_url");
    url.query_pairs()
        .find(|(k, _)| k == "vnp_TxnRef")
        .map(|(_, v)| v.into_owned())
}

fn gateway_params(txn_ref: &str, amount: &str, response_code: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("vnp_TxnRef".to_string(), txn_ref.to_string()),
        ("vnp_Amount".to_string(), amount.to_string()),
        ("vnp_ResponseCode".to_string(), response_code.to_string()),
        ("vnp_TransactionStatus".to_string(), response_code.to_string()),
        ("vnp_TransactionNo".to_string(), "14226112".to_string()),
    ])
}

async fn send_ipn(client: &Client, params: &BTreeMap<String, String>) -> Value {
    let resp = client
        .get(api_url("/webhooks/vnpay/direct"))
        .query(params)
        .send()
        .await
        .expect("Failed to send IPN");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Invalid IPN body")
}

async fn first_in_stock_product(client: &Client) -> Value {
    let resp = client
        .get(api_url("/products?limit=50"))
        .send()
        .await
        .expect("Failed to list products");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Invalid JSON");
    body["products"]
        .as_array()
        .and_then(|products| {
            products
                .iter()
                .find(|p| p["stock"].as_i64().unwrap_or_default() > 2)
                .cloned()
        })
        .expect("Seeded catalog has no product in stock")
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog"]
async fn test_product_list_pagination() {
    let resp = Client::new()
        .get(api_url("/products?page=1&limit=2"))
        .send()
        .await
        .expect("Failed to list products");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["limit"], 2);
    assert!(body["products"].as_array().is_some_and(|p| p.len() <= 2));
    assert!(body["total"].as_i64().is_some());
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog"]
async fn test_unknown_product_is_not_found() {
    let resp = Client::new()
        .get(api_url("/products/999999999"))
        .send()
        .await
        .expect("Failed to get product");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog"]
async fn test_category_tree() {
    let resp = Client::new()
        .get(api_url("/categories"))
        .send()
        .await
        .expect("Failed to list categories");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog"]
async fn test_cart_add_then_clear() {
    let session = Session::register_customer().await;
    let product = first_in_stock_product(&session.client).await;

    let resp = session
        .post("/cart/add")
        .json(&json!({ "product_id": product["id"], "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = session.get("/cart").send().await.expect("Failed to get cart");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["cart"]["items"].as_array().map(Vec::len), Some(1));

    let resp = session
        .client
        .delete(api_url("/cart/clear"))
        .bearer_auth(&session.access_token)
        .send()
        .await
        .expect("Failed to clear cart");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog"]
async fn test_cart_rejects_quantity_over_stock() {
    let session = Session::register_customer().await;
    let product = first_in_stock_product(&session.client).await;
    let too_many = product["stock"].as_i64().unwrap_or_default() + 1;

    let resp = session
        .post("/cart/add")
        .json(&json!({ "product_id": product["id"], "quantity": too_many }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog"]
async fn test_checkout_then_cancel() {
    let session = Session::register_customer().await;
    let product = first_in_stock_product(&session.client).await;

    let resp = session
        .post("/orders")
        .json(&json!({
            "items": [{ "product_id": product["id"], "quantity": 1 }],
            "shipping_address": {
                "first_name": "Integration",
                "last_name": "Test",
                "address1": "1 Test Street",
                "city": "Hanoi",
                "postal_code": "100000",
                "country": "VN",
                "phone": "0900000000",
            },
            "payment_method": "cod",
        }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Invalid JSON");
    let order_id = body["id"].clone();
    assert_eq!(body["status"], "pending");

    let resp = session
        .post(&format!("/orders/{order_id}/cancel"))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["order"]["status"], "cancelled");
}

#[tokio::test]
#[ignore = "Requires running API server with seeded admin"]
async fn test_cancel_restores_stock() {
    let admin = Session::admin().await;
    let product = admin.create_product(10).await;
    let product_id = &product["id"];

    let session = Session::register_customer().await;
    let (status, order) = session.place_order(product_id, 3, "cod").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product_stock(&session.client, product_id).await, 7);

    let resp = session
        .post(&format!("/orders/{}/cancel", order["id"]))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(product_stock(&session.client, product_id).await, 10);

    // A second cancel must not restore the stock twice
    let resp = session
        .post(&format!("/orders/{}/cancel", order["id"]))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(product_stock(&session.client, product_id).await, 10);
}

#[tokio::test]
#[ignore = "Requires running API server with seeded admin"]
async fn test_deleted_product_releases_its_sku() {
    let admin = Session::admin().await;
    let product = admin.create_product(1).await;

    let resp = admin
        .delete(&format!("/admin/products/{}", product["id"]))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = admin
        .post("/admin/products")
        .json(&json!({ "name": "Reissued", "price": "99000", "sku": product["sku"] }))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = admin
        .post("/admin/products")
        .json(&json!({ "name": "Duplicate", "price": "99000", "sku": product["sku"] }))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_ipn_with_bad_signature_is_rejected() {
    let mut params = gateway_params("ORDER_1_1", "15000000", "00");
    params.insert("vnp_SecureHash".to_string(), "0".repeat(64));

    let body = send_ipn(&Client::new(), &params).await;
    // 99 means the server has no VNPay merchant to check against
    if body["RspCode"] != "99" {
        assert_eq!(body["RspCode"], "97");
    }
}

#[tokio::test]
#[ignore = "Requires running API server with VNPay configured and VNPAY_HASH_KEY set"]
async fn test_signed_ipn_settles_once_and_return_is_idempotent() {
    let admin = Session::admin().await;
    let product = admin.create_product(5).await;
    let session = Session::register_customer().await;
    let (status, order) = session.place_order(&product["id"], 1, "vnpay").await;
    assert_eq!(status, StatusCode::CREATED);

    let Some(txn_ref) = start_vnpay_payment(&session, &order["id"]).await else {
        return;
    };
    let amount = vnpay_amount(&order["total_amount"]);
    let Some(paid) = sign_vnpay(gateway_params(&txn_ref, &amount, "00")) else {
        return;
    };

    let unknown = sign_vnpay(gateway_params("ORDER_0_0", &amount, "00")).unwrap_or_default();
    assert_eq!(send_ipn(&session.client, &unknown).await["RspCode"], "01");

    let short = sign_vnpay(gateway_params(&txn_ref, "100", "00")).unwrap_or_default();
    assert_eq!(send_ipn(&session.client, &short).await["RspCode"], "04");

    assert_eq!(send_ipn(&session.client, &paid).await["RspCode"], "00");
    assert_eq!(send_ipn(&session.client, &paid).await["RspCode"], "02");

    // A late failure report cannot undo the payment
    let declined = sign_vnpay(gateway_params(&txn_ref, &amount, "24")).unwrap_or_default();
    assert_eq!(send_ipn(&session.client, &declined).await["RspCode"], "02");

    for _ in 0..2 {
        let resp = session
            .get("/payments/vnpay/return")
            .query(&paid)
            .send()
            .await
            .expect("Failed to return from VNPay");
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.expect("Invalid JSON");
        assert_eq!(body["status"], "success");
    }

    let order = session.order(&order["id"]).await;
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["payments"][0]["status"], "completed");
}

#[tokio::test]
#[ignore = "Requires running API server with VNPay configured and VNPAY_HASH_KEY set"]
async fn test_payment_after_cancel_is_flagged_for_refund() {
    let admin = Session::admin().await;
    let product = admin.create_product(5).await;
    let session = Session::register_customer().await;
    let (_, order) = session.place_order(&product["id"], 1, "vnpay").await;

    let Some(txn_ref) = start_vnpay_payment(&session, &order["id"]).await else {
        return;
    };
    let Some(paid) = sign_vnpay(gateway_params(
        &txn_ref,
        &vnpay_amount(&order["total_amount"]),
        "00",
    )) else {
        return;
    };

    let resp = session
        .post(&format!("/orders/{}/cancel", order["id"]))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled = session.order(&order["id"]).await;
    assert_eq!(cancelled["payments"][0]["status"], "failed");

    assert_eq!(send_ipn(&session.client, &paid).await["RspCode"], "00");
    assert_eq!(send_ipn(&session.client, &paid).await["RspCode"], "02");

    let order = session.order(&order["id"]).await;
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment_status"], "refund_pending");
    assert_eq!(order["payments"][0]["status"], "completed");
}

#[tokio::test]
#[ignore = "Requires running API server with seeded admin"]
async fn test_only_the_supplying_partner_settles_a_partner_payment() {
    let admin = Session::admin().await;
    let supplier = PartnerAccount::create(&admin).await;
    let stranger = PartnerAccount::create(&admin).await;

    let resp = supplier
        .post("/partners/products")
        .json(&json!({
            "name": format!("Partner product {}", supplier.id),
            "price": "250000",
            "sku": format!("PT-{}", uuid_tag()),
            "stock": 5,
        }))
        .send()
        .await
        .expect("Failed to submit product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Invalid JSON");
    let product_id = body["product"]["id"].clone();

    let resp = admin
        .post(&format!("/admin/products/{product_id}/approve"))
        .send()
        .await
        .expect("Failed to approve product");
    assert_eq!(resp.status(), StatusCode::OK);

    let session = Session::register_customer().await;
    let (status, order) = session.place_order(&product_id, 1, "partner").await;
    assert_eq!(status, StatusCode::CREATED);
    let payment = &order["payments"][0];
    assert_eq!(payment["payment_method"], "partner");
    assert_eq!(payment["status"], "pending");

    let notice = |partner: &PartnerAccount, txn: &str| {
        partner.payment_notice(&order["id"], &payment["id"], "completed", &payment["amount"], txn)
    };

    let resp = stranger
        .post("/webhooks/partner/payment")
        .json(&notice(&stranger, "STRANGER-1"))
        .send()
        .await
        .expect("Failed to notify");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let txn = format!("SUP-{}", uuid_tag());
    for _ in 0..2 {
        let resp = supplier
            .post("/webhooks/partner/payment")
            .json(&notice(&supplier, &txn))
            .send()
            .await
            .expect("Failed to notify");
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.expect("Invalid JSON");
        assert_eq!(body["payment_status"], "completed");
        assert_eq!(body["order_payment_status"], "paid");
    }
}

#[tokio::test]
#[ignore = "Requires running API server with seeded admin"]
async fn test_partner_payment_needs_a_partner_product() {
    let admin = Session::admin().await;
    let product = admin.create_product(5).await;
    let session = Session::register_customer().await;

    let (status, body) = session.place_order(&product["id"], 1, "partner").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Partner payment requires at least one partner product");
}

#[tokio::test]
#[ignore = "Requires running API server with seeded catalog and admin"]
async fn test_admin_lists_users() {
    let admin = Session::admin().await;
    let resp = admin
        .get("/admin/users?page=1&limit=5")
        .send()
        .await
        .expect("Failed to list users");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert!(body["users"].is_array());
    assert!(body["pagination"].is_object());
}

fn uuid_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
