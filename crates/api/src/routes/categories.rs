//! Public category tree.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::categories;
use crate::error::Result;
use crate::models::CategoryNode;
use crate::state::AppState;

/// Build the `/categories` router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// `GET /categories`
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Value>> {
    let categories = categories::list_active(state.pool()).await?;
    Ok(Json(json!({ "categories": CategoryNode::build_tree(categories) })))
}
