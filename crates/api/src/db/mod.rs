//! Database operations for the API `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `refresh_tokens` - Accounts and long-lived sessions
//! - `categories`, `products` - Catalog (soft delete via `deleted_at`)
//! - `carts`, `cart_items` - One cart per user
//! - `orders`, `order_items`, `shipping_addresses` - Placed orders
//! - `payments` - Gateway and partner payment attempts
//! - `coupons` - Discount codes
//! - `partners` - API-key integrations
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p ecom-cli -- migrate run
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as`) so the crate builds
//! without a live database.

pub mod carts;
pub mod categories;
pub mod coupons;
pub mod orders;
pub mod partners;
pub mod payments;
pub mod products;
pub mod refresh_tokens;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict(message)`.
    pub(crate) fn unique_violation(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Migrations embedded from `crates/api/migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
