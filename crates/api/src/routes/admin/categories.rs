//! Category administration.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::{info, instrument};

use ecom_core::CategoryId;

use crate::db::categories::{self, CategoryUpdate, NewCategory};
use crate::error::{AppError, OrNotFound, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryNode};
use crate::state::AppState;

const CATEGORY_NOT_FOUND: &str = "Category not found";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
}

/// A parent must exist, and when re-parenting `id` it must not be `id`
/// itself or one of its descendants.
async fn check_parent(pool: &PgPool, id: Option<CategoryId>, parent: CategoryId) -> Result<()> {
    if id == Some(parent) {
        return Err(AppError::BadRequest(
            "Category cannot be its own parent".to_string(),
        ));
    }
    if categories::get(pool, parent).await?.is_none() {
        return Err(AppError::BadRequest("Parent category not found".to_string()));
    }
    if let Some(id) = id
        && categories::is_descendant(pool, id, parent).await?
    {
        return Err(AppError::BadRequest(
            "Category cannot be moved under its own descendant".to_string(),
        ));
    }
    Ok(())
}

/// `GET /admin/categories`
///
/// Includes inactive categories.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let all = categories::list_all(state.pool()).await?;
    Ok(Json(json!({ "categories": CategoryNode::build_tree(all) })))
}

/// `GET /admin/categories/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>> {
    categories::get(state.pool(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(CATEGORY_NOT_FOUND.to_string()))
}

/// `POST /admin/categories`
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(new): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>)> {
    if new.name.trim().is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }
    if let Some(parent) = new.parent_id {
        check_parent(state.pool(), None, parent).await?;
    }

    let category = categories::create(state.pool(), &new).await?;
    info!(category_id = %category.id, name = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PUT /admin/categories/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(update): Json<CategoryUpdate>,
) -> Result<Json<Category>> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Category name cannot be empty".to_string()));
    }
    if let Some(parent) = update.parent_id {
        check_parent(state.pool(), Some(id), parent).await?;
    }

    let category = categories::update(state.pool(), id, &update)
        .await
        .or_not_found(CATEGORY_NOT_FOUND)?;
    Ok(Json(category))
}

/// `DELETE /admin/categories/{id}`
///
/// Refused while products or child categories still point at it.
#[instrument(skip_all, fields(admin_id = %admin.id, category_id = %id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Value>> {
    if categories::get(state.pool(), id).await?.is_none() {
        return Err(AppError::NotFound(CATEGORY_NOT_FOUND.to_string()));
    }

    let usage = categories::usage(state.pool(), id).await?;
    if usage.products > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete category with associated products".to_string(),
        ));
    }
    if usage.children > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete category with child categories".to_string(),
        ));
    }

    categories::soft_delete(state.pool(), id)
        .await
        .or_not_found(CATEGORY_NOT_FOUND)?;
    info!("Category deleted");

    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
