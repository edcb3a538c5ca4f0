//! Authentication service.
//!
//! Password and Google sign-in, access token issuance and refresh token
//! rotation. Access tokens are short-lived JWTs; refresh tokens are opaque
//! random strings stored in `refresh_tokens`.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{Claims, JwtKeys};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};

use ecom_core::{Email, UserId, UserRole};

use crate::config::AuthConfig;
use crate::db::refresh_tokens;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;
use crate::services::google::GoogleIdentity;
use crate::services::keys::{REFRESH_TOKEN_BYTES, random_hex};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Self-service registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Tokens handed to a client after sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
    keys: &'a JwtKeys,
    config: &'a AuthConfig,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, keys: &'a JwtKeys, config: &'a AuthConfig) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            keys,
            config,
        }
    }

    /// Register a customer account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::MissingField` if a name is blank.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: &Registration) -> Result<AuthSession, AuthError> {
        let email = Email::parse(&form.email)?;
        validate_password(&form.password)?;
        require_names(&form.first_name, &form.last_name)?;

        let password_hash = hash_password(&form.password)?;
        let user = self
            .users
            .create(&NewUser {
                email,
                password_hash,
                first_name: form.first_name.trim().to_owned(),
                last_name: form.last_name.trim().to_owned(),
                phone: form.phone.clone(),
                address: form.address.clone(),
                role: UserRole::Customer,
                email_verified: false,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        self.start_session(user).await
    }

    /// Sign in with email and password.
    ///
    /// Unknown email, wrong password and deactivated account all produce
    /// the same error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if authentication fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &hash)?;

        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        self.start_session(user).await
    }

    /// Sign in with a verified Google identity, creating the account on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountDisabled` if the existing account is inactive.
    #[instrument(skip(self, identity), fields(email = %identity.email))]
    pub async fn login_with_google(
        &self,
        identity: GoogleIdentity,
    ) -> Result<AuthSession, AuthError> {
        let user = match self.users.get_by_email(&identity.email).await? {
            Some(user) => user,
            None => {
                // The account has no usable password until the user sets one.
                let password_hash = hash_password(&random_hex(REFRESH_TOKEN_BYTES))?;
                let user = self
                    .users
                    .create(&NewUser {
                        email: identity.email,
                        password_hash,
                        first_name: identity.first_name,
                        last_name: identity.last_name,
                        phone: None,
                        address: None,
                        role: UserRole::Customer,
                        email_verified: true,
                    })
                    .await?;
                info!(user_id = %user.id, "User registered via Google");
                user
            }
        };

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.start_session(user).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRefreshToken` if the token is unknown or
    /// expired, or its owner is gone or inactive.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, User), AuthError> {
        let user_id = refresh_tokens::find_valid_owner(self.pool, refresh_token)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let access_token = self.keys.issue(&user)?;
        Ok((access_token, user))
    }

    /// Revoke one of the caller's refresh tokens.
    ///
    /// Returns `false` if the token did not belong to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    #[instrument(skip(self, refresh_token))]
    pub async fn logout(&self, user_id: UserId, refresh_token: &str) -> Result<bool, AuthError> {
        let deleted = refresh_tokens::delete_for_user(self.pool, user_id, refresh_token).await?;
        Ok(deleted)
    }

    /// Replace a user's password (admin reset).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    pub async fn set_password(&self, user_id: UserId, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let hash = hash_password(password)?;
        self.users.set_password_hash(user_id, &hash).await?;
        Ok(())
    }

    async fn start_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let access_token = self.keys.issue(&user)?;
        let refresh_token = random_hex(REFRESH_TOKEN_BYTES);
        let expires_at = Utc::now() + self.config.refresh_token_ttl;
        refresh_tokens::insert(self.pool, user.id, &refresh_token, expires_at).await?;

        Ok(AuthSession {
            user,
            access_token,
            refresh_token,
        })
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` when the password is shorter than
/// `MIN_PASSWORD_LENGTH` characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Both names are required at registration.
///
/// # Errors
///
/// Returns `AuthError::MissingField` naming the first blank field.
pub fn require_names(first_name: &str, last_name: &str) -> Result<(), AuthError> {
    if first_name.trim().is_empty() {
        return Err(AuthError::MissingField("first_name"));
    }
    if last_name.trim().is_empty() {
        return Err(AuthError::MissingField("last_name"));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_is_counted_in_characters() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("mậtkhẩu").is_ok());
    }

    #[test]
    fn test_blank_names_are_missing_fields_not_weak_passwords() {
        assert!(require_names("Lan", "Nguyen").is_ok());
        assert!(matches!(
            require_names("  ", "Nguyen"),
            Err(AuthError::MissingField("first_name"))
        ));
        assert!(matches!(
            require_names("Lan", ""),
            Err(AuthError::MissingField("last_name"))
        ));
        assert_eq!(
            require_names("Lan", "").unwrap_err().to_string(),
            "last_name is required"
        );
    }

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("admin123", &hash).is_ok());
        assert!(matches!(
            verify_password("admin124", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same-password").unwrap(), hash_password("same-password").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
