//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password and Google sign-in, JWT access tokens, refresh tokens
//! - `catalog_cache` - In-memory product list cache
//! - `checkout` - Order placement and status changes
//! - `google` - Google ID token verification
//! - `keys` - Random refresh tokens and partner API keys
//! - `payments` - VNPay and partner payment settlement
//! - `pricing` - Totals and coupon discounts
//! - `vnpay` - VNPay URL signing and callback verification
//! - `webhook_proxy` - Forward payment webhooks to an external function

pub mod auth;
pub mod catalog_cache;
pub mod checkout;
pub mod google;
pub mod keys;
pub mod payments;
pub mod pricing;
pub mod vnpay;
pub mod webhook_proxy;
