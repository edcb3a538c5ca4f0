//! Account and token lifecycle against a running server.
//!
//! Run with: `cargo test -p ecom-integration-tests -- --ignored`

use ecom_integration_tests::{Session, api_url, base_url};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health() {
    let resp = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_register_then_profile() {
    let session = Session::register_customer().await;
    assert_eq!(session.user["role"], "customer");
    assert!(session.user.get("password_hash").is_none());

    let resp = session
        .get("/users/profile")
        .send()
        .await
        .expect("Failed to get profile");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_duplicate_registration_conflicts() {
    let session = Session::register_customer().await;
    let resp = Client::new()
        .post(api_url("/auth/register"))
        .json(&json!({
            "email": session.user["email"],
            "password": "integration-pass",
            "first_name": "Again",
            "last_name": "Test",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_wrong_password_is_unauthorized() {
    let session = Session::register_customer().await;
    let resp = Client::new()
        .post(api_url("/auth/login"))
        .json(&json!({ "email": session.user["email"], "password": "not-the-password" }))
        .send()
        .await
        .expect("Failed to log in");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_refresh_then_logout_revokes_token() {
    let session = Session::register_customer().await;

    let resp = session
        .client
        .post(api_url("/auth/refresh"))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await
        .expect("Failed to refresh");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert!(body["access_token"].is_string());

    let resp = session
        .post("/auth/logout")
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = session
        .client
        .post(api_url("/auth/refresh"))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await
        .expect("Failed to refresh");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_customer_cannot_reach_admin() {
    let session = Session::register_customer().await;
    let resp = session
        .get("/admin/users")
        .send()
        .await
        .expect("Failed to call admin");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
