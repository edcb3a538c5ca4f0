//! Sign-up, sign-in and token lifecycle.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::auth::{AuthService, AuthSession, Registration};
use crate::services::google;
use crate::state::AppState;

/// Build the `/auth` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/google", post(google_login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

fn service(state: &AppState) -> AuthService<'_> {
    AuthService::new(state.pool(), state.jwt(), &state.config().auth)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /auth/register`
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> Result<(StatusCode, Json<AuthSession>)> {
    let session = service(&state).register(&form).await?;
    info!(user_id = %session.user.id, "User registered");
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/login`
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginRequest>,
) -> Result<Json<AuthSession>> {
    let session = service(&state).login(&form.email, &form.password).await?;
    Ok(Json(session))
}

/// `POST /auth/google`
#[instrument(skip_all)]
pub async fn google_login(
    State(state): State<AppState>,
    Json(form): Json<GoogleLoginRequest>,
) -> Result<Json<AuthSession>> {
    let identity =
        google::verify_id_token(state.http(), &state.config().google, &form.id_token).await?;
    let session = service(&state).login_with_google(identity).await?;
    Ok(Json(session))
}

/// `POST /auth/refresh`
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(form): Json<RefreshRequest>,
) -> Result<Json<Value>> {
    let (access_token, user) = service(&state).refresh(&form.refresh_token).await?;
    Ok(Json(json!({ "access_token": access_token, "user": user })))
}

/// `POST /auth/logout`
///
/// Deletes the given refresh token if it belongs to the caller. Logging out
/// twice is not an error.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(form): Json<RefreshRequest>,
) -> Result<Json<Value>> {
    let revoked = service(&state).logout(user.id, &form.refresh_token).await?;
    info!(revoked, "User logged out");
    Ok(Json(json!({ "message": "Logged out successfully" })))
}
