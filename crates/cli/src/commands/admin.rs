//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! ecom-cli admin create -e ops@example.com -p 's3cret!' -f Ops -l Team
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use sqlx::PgPool;
use thiserror::Error;

use ecom_api::db::users::NewUser;
use ecom_api::db::{RepositoryError, UserRepository};
use ecom_api::models::User;
use ecom_api::services::auth::{AuthError, hash_password, validate_password};
use ecom_core::{Email, UserRole};

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Database error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password rejected or could not be hashed.
    #[error("Password error: {0}")]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),
}

/// Fields for an admin account.
#[derive(Debug, Clone)]
pub struct NewAdmin<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Insert a verified, active admin account.
///
/// # Errors
///
/// Returns `AdminError::UserExists` if the email is taken.
pub async fn insert_admin(pool: &PgPool, admin: &NewAdmin<'_>) -> Result<User, AdminError> {
    let email =
        Email::parse(admin.email).map_err(|_| AdminError::InvalidEmail(admin.email.to_owned()))?;
    validate_password(admin.password)?;

    let users = UserRepository::new(pool);
    if users.get_by_email(&email).await?.is_some() {
        return Err(AdminError::UserExists(email.to_string()));
    }

    let user = users
        .create(&NewUser {
            email,
            password_hash: hash_password(admin.password)?,
            first_name: admin.first_name.to_owned(),
            last_name: admin.last_name.to_owned(),
            phone: admin.phone.clone(),
            address: admin.address.clone(),
            role: UserRole::Admin,
            email_verified: true,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(admin.email.to_owned()),
            other => AdminError::Repository(other),
        })?;
    Ok(user)
}

/// Create a new admin account.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken or the
/// database is unreachable.
pub async fn create_user(
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Result<i32, AdminError> {
    let pool = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let user = insert_admin(
        &pool,
        &NewAdmin {
            email,
            password,
            first_name,
            last_name,
            phone: None,
            address: None,
        },
    )
    .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id.as_i32())
}
