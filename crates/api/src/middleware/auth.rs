//! Authentication extractors.
//!
//! - [`RequireUser`] - valid `Authorization: Bearer <jwt>`
//! - [`RequireAdmin`] - as above, with the admin role
//! - [`RequirePartner`] - active partner identified by `X-API-Key` + `X-Secret-Key`
//!
//! Rejections use the same `{"error": "..."}` body as [`crate::error::AppError`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::Span;

use crate::db::partners;
use crate::error::set_sentry_user;
use crate::models::{AuthUser, Partner};
use crate::services::vnpay::constant_time_compare;
use crate::state::AppState;

/// Header carrying a partner's public key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying a partner's secret key.
pub const SECRET_KEY_HEADER: &str = "x-secret-key";

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub AuthUser);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub AuthUser);

/// Extractor that requires valid partner API credentials.
pub struct RequirePartner(pub Partner);

/// Why an authenticated extractor refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    NotBearer,
    InvalidToken,
    NotAdmin,
    MissingApiCredentials,
    InvalidApiCredentials,
    Internal,
}

impl AuthRejection {
    const fn status(self) -> StatusCode {
        match self {
            Self::NotAdmin => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::MissingHeader => "Authorization header required",
            Self::NotBearer => "Bearer token required",
            Self::InvalidToken => "Invalid token",
            Self::NotAdmin => "Admin access required",
            Self::MissingApiCredentials => "API credentials required",
            Self::InvalidApiCredentials => "Invalid API credentials",
            Self::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Pull the token out of an `Authorization` header value.
fn bearer_token(header: Option<&str>) -> Result<&str, AuthRejection> {
    let value = header.ok_or(AuthRejection::MissingHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::NotBearer)
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;

        let claims = state
            .jwt()
            .verify(token)
            .map_err(|_| AuthRejection::InvalidToken)?;
        let user = AuthUser::from(claims);

        Span::current().record("user_id", user.id.as_i32());
        set_sentry_user(&user.id, Some(&user.email));

        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthRejection::NotAdmin);
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequirePartner {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let (Some(api_key), Some(secret_key)) = (header(API_KEY_HEADER), header(SECRET_KEY_HEADER))
        else {
            return Err(AuthRejection::MissingApiCredentials);
        };

        let partner = partners::find_active_by_api_key(state.pool(), api_key)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Partner lookup failed");
                AuthRejection::Internal
            })?
            .ok_or(AuthRejection::InvalidApiCredentials)?;

        if !constant_time_compare(&partner.secret_key, secret_key) {
            return Err(AuthRejection::InvalidApiCredentials);
        }

        Span::current().record("partner_id", partner.id.as_i32());
        Ok(Self(partner))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(None), Err(AuthRejection::MissingHeader));
        assert_eq!(bearer_token(Some("Basic xyz")), Err(AuthRejection::NotBearer));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthRejection::NotBearer));
    }

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(AuthRejection::NotAdmin.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthRejection::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthRejection::InvalidApiCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_rejection_body() {
        let response = AuthRejection::MissingHeader.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Authorization header required");
    }
}
