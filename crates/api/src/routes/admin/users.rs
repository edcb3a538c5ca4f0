//! Account administration.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{Pagination, UserId};

use crate::db::UserRepository;
use crate::db::users::AdminUserUpdate;
use crate::error::{AppError, OrNotFound, Result};
use crate::middleware::RequireAdmin;
use crate::services::auth::AuthService;
use crate::state::AppState;

const USER_NOT_FOUND: &str = "User not found";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/password", put(set_password))
}

#[derive(Debug, Deserialize)]
pub struct PasswordReset {
    pub new_password: String,
}

/// `GET /admin/users`
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Value>> {
    let (users, total) = UserRepository::new(state.pool()).list(page).await?;
    Ok(Json(json!({ "users": users, "pagination": page.info(total) })))
}

/// `GET /admin/users/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;
    Ok(Json(json!({ "user": user })))
}

/// `PUT /admin/users/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<Json<Value>> {
    if id == admin.id && update.is_active == Some(false) {
        return Err(AppError::BadRequest(
            "Cannot deactivate your own account".to_string(),
        ));
    }
    let profile = &update.profile;
    if profile.first_name.as_deref().is_some_and(|n| n.trim().is_empty())
        || profile.last_name.as_deref().is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::BadRequest("Name cannot be empty".to_string()));
    }

    let user = UserRepository::new(state.pool())
        .update(id, &update)
        .await
        .or_not_found(USER_NOT_FOUND)?;
    info!(role = %user.role, is_active = user.is_active, "User updated by admin");

    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

/// `PUT /admin/users/{id}/password`
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn set_password(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(form): Json<PasswordReset>,
) -> Result<Json<Value>> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    AuthService::new(state.pool(), state.jwt(), &state.config().auth)
        .set_password(id, &form.new_password)
        .await?;
    info!("Password reset by admin");

    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// `DELETE /admin/users/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    UserRepository::new(state.pool())
        .soft_delete(id)
        .await
        .or_not_found(USER_NOT_FOUND)?;
    info!("User deleted by admin");

    Ok(Json(json!({ "message": "User deleted successfully" })))
}
