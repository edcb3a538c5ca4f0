//! The caller's own profile.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use tracing::instrument;

use crate::db::UserRepository;
use crate::db::users::ProfileUpdate;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::User;
use crate::state::AppState;

/// Build the `/users` router.
pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(profile).put(update_profile))
}

/// `GET /users/profile`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn profile(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// `PUT /users/profile`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    if update.first_name.as_deref().is_some_and(|n| n.trim().is_empty())
        || update.last_name.as_deref().is_some_and(|n| n.trim().is_empty())
    {
        return Err(AppError::BadRequest("Name cannot be empty".to_string()));
    }

    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, &update)
        .await?;
    Ok(Json(updated))
}
