//! HTTP route handlers for the REST API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Everything below is nested under /api/v1
//!
//! # Auth (strict rate limit)
//! POST /auth/register                   - Create account, returns tokens
//! POST /auth/login                      - Email + password
//! POST /auth/google                     - Google ID token
//! POST /auth/refresh                    - New access token from refresh token
//! POST /auth/logout                     - Revoke refresh token (bearer)
//!
//! # Profile (bearer)
//! GET  /users/profile
//! PUT  /users/profile
//!
//! # Catalog
//! GET  /products                        - Active products (cached)
//! GET  /products/{id}                   - Product detail, bumps view count
//! GET  /categories                      - Active category tree
//!
//! # Cart (bearer)
//! GET    /cart
//! POST   /cart/add
//! PUT    /cart/items/{item_id}
//! DELETE /cart/items/{item_id}
//! DELETE /cart/clear
//!
//! # Orders (bearer)
//! GET  /orders
//! POST /orders                          - Checkout
//! GET  /orders/{id}
//! POST /orders/{id}/cancel
//! GET  /coupons/{code}/validate         - Coupon preview
//!
//! # Payments
//! POST /payments/vnpay/create           - Signed VNPay URL (bearer)
//! GET  /payments/vnpay/return           - Browser return (bearer)
//! GET|POST /webhooks/vnpay              - IPN (proxied when configured)
//! GET|POST /webhooks/vnpay/direct       - IPN, always local
//! POST /webhooks/partner/payment        - Partner settlement (API key)
//!
//! # Partner API (API key)
//! GET  /partners/products
//! POST /partners/products
//! PUT  /partners/products/{id}
//!
//! # Admin (admin bearer)
//! /admin/users, /admin/products, /admin/categories,
//! /admin/orders, /admin/partners, /admin/coupons
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod coupons;
pub mod health;
pub mod orders;
pub mod partners;
pub mod payments;
pub mod products;
pub mod users;
pub mod webhooks;

use axum::Router;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Path prefix for every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Routes under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router().layer(auth_rate_limiter()))
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/coupons", coupons::router())
        .nest("/payments", payments::router())
        .nest("/webhooks", webhooks::router())
        .nest("/partners", partners::router())
        .nest("/admin", admin::router())
        .layer(api_rate_limiter())
}

/// Create all routes: health checks at the root plus the versioned API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest(API_PREFIX, api_routes())
}
