//! Access token signing and verification (HS256 JWT).

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use ecom_core::{UserId, UserRole};

use super::AuthError;
use crate::models::{AuthUser, User};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Signing and verification keys derived from `JWT_SECRET`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Build keys for a shared secret and token lifetime.
    #[must_use]
    pub fn new(secret: &SecretString, ttl: chrono::Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue an access token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.as_str().to_owned(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Verify a token's signature and expiry and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any malformed, forged or
    /// expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ecom_core::Email;

    use super::*;

    fn keys(secret: &str, ttl: chrono::Duration) -> JwtKeys {
        JwtKeys::new(&SecretString::from(secret.to_string()), ttl)
    }

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(42),
            email: Email::parse("shopper@example.com").unwrap(),
            first_name: "Lan".to_string(),
            last_name: "Tran".to_string(),
            phone: None,
            address: None,
            city: None,
            country: None,
            postal_code: None,
            role,
            is_active: true,
            email_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issued_token_verifies() {
        let keys = keys("k7Qp2Zr9Lx4Vb8Nm1Tc6Hy3Jd5Fw0Gs!", chrono::Duration::hours(1));
        let token = keys.issue(&user(UserRole::Admin)).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, UserId::new(42));
        assert_eq!(claims.email, "shopper@example.com");
        assert_eq!(claims.role, UserRole::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let a = keys("k7Qp2Zr9Lx4Vb8Nm1Tc6Hy3Jd5Fw0Gs!", chrono::Duration::hours(1));
        let b = keys("Zq8Rk3Wm6Tp1Yx9Lc4Vn7Hb2Jf5Ds0Ga#", chrono::Duration::hours(1));

        let token = a.issue(&user(UserRole::Customer)).unwrap();
        assert!(matches!(b.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = keys("k7Qp2Zr9Lx4Vb8Nm1Tc6Hy3Jd5Fw0Gs!", chrono::Duration::minutes(-5));
        let token = keys.issue(&user(UserRole::Customer)).unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let keys = keys("k7Qp2Zr9Lx4Vb8Nm1Tc6Hy3Jd5Fw0Gs!", chrono::Duration::hours(1));
        assert!(matches!(keys.verify("not.a.jwt"), Err(AuthError::InvalidToken)));
        assert!(matches!(keys.verify(""), Err(AuthError::InvalidToken)));
    }
}
