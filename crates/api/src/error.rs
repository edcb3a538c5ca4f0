//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error response has the body `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;
use crate::services::pricing::CouponError;
use crate::services::vnpay::VnpayError;
use crate::services::webhook_proxy::ProxyError;

const INTERNAL: &str = "Internal server error";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order placement or status change failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment creation or settlement failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Coupon could not be applied.
    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    /// Webhook forwarding failed.
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Uniqueness or state conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and client-facing message.
    ///
    /// Internal details never reach the client.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_response(err),
            Self::Auth(err) => auth_response(err),
            Self::Checkout(err) => checkout_response(err),
            Self::Payment(err) => payment_response(err),
            Self::Coupon(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Proxy(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
        }
    }
}

fn repository_response(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
    }
}

fn auth_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::AccountDisabled => {
            (StatusCode::UNAUTHORIZED, "Account is deactivated".to_string())
        }
        AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists".to_string()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::MissingField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
        AuthError::InvalidRefreshToken => {
            (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
        }
        AuthError::GoogleToken(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        AuthError::GoogleUnavailable(_) => (
            StatusCode::BAD_GATEWAY,
            "Failed to verify Google token".to_string(),
        ),
        AuthError::Repository(err) => repository_response(err),
        AuthError::TokenEncoding(_) | AuthError::PasswordHash => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn checkout_response(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::ProductNotFound(_) | CheckoutError::OrderNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::Repository(err) => repository_response(err),
        CheckoutError::EmptyOrder
        | CheckoutError::NoPartnerProducts
        | CheckoutError::InvalidQuantity(_)
        | CheckoutError::MissingAddressFields(_)
        | CheckoutError::InsufficientStock(_)
        | CheckoutError::Coupon(_)
        | CheckoutError::InvalidTransition { .. }
        | CheckoutError::NotCancellable => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn payment_response(err: &PaymentError) -> (StatusCode, String) {
    match err {
        PaymentError::OrderNotFound | PaymentError::PaymentNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        PaymentError::AlreadyProcessed
        | PaymentError::OrderCancelled
        | PaymentError::AmountMismatch => (StatusCode::BAD_REQUEST, err.to_string()),
        PaymentError::InvalidPartnerSignature => (StatusCode::UNAUTHORIZED, err.to_string()),
        PaymentError::Vnpay(vnpay) => match vnpay {
            VnpayError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, vnpay.to_string()),
            VnpayError::MissingSignature | VnpayError::InvalidSignature => {
                (StatusCode::BAD_REQUEST, "Invalid signature".to_string())
            }
            VnpayError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, vnpay.to_string()),
            VnpayError::Url(_) | VnpayError::Key => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
        },
        PaymentError::Repository(err) => repository_response(err),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Replace a repository `NotFound` with a resource-specific 404 message.
pub trait OrNotFound<T> {
    /// # Errors
    ///
    /// Returns `AppError::NotFound(message)` for a missing row, otherwise
    /// the repository error unchanged.
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OrNotFound<T> for std::result::Result<T, RepositoryError> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.map_err(|err| match err {
            RepositoryError::NotFound => AppError::NotFound(message.to_string()),
            other => AppError::Database(other),
        })
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ecom_core::{OrderStatus, ProductId};

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::ServiceUnavailable("test".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(RepositoryError::Conflict("SKU already exists".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::AccountDisabled.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(CheckoutError::ProductNotFound(ProductId::new(9)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                CheckoutError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PaymentError::Vnpay(VnpayError::NotConfigured).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(PaymentError::InvalidPartnerSignature.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(CouponError::Expired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::NoPartnerProducts.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_blank_name_is_reported_as_missing_field() {
        let response = AppError::from(AuthError::MissingField("first_name")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "first_name is required");
    }

    #[tokio::test]
    async fn test_error_body_is_json_and_hides_internals() {
        let response = AppError::Internal("connection refused at 10.0.0.5".to_string())
            .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_checkout_message_reaches_client() {
        let response =
            AppError::from(CheckoutError::InsufficientStock("Blue Mug".to_string())).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Insufficient stock for product Blue Mug");
    }

    #[test]
    fn test_or_not_found_names_the_resource() {
        let missing: std::result::Result<(), RepositoryError> = Err(RepositoryError::NotFound);
        let err = missing.or_not_found("Partner not found").unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Partner not found"));

        let conflict: std::result::Result<(), RepositoryError> =
            Err(RepositoryError::Conflict("Email already exists".to_string()));
        assert_eq!(
            get_status(conflict.or_not_found("Partner not found").unwrap_err()),
            StatusCode::CONFLICT
        );
    }
}
