//! Customer orders: checkout, history, cancellation.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{OrderId, OrderStatus};

use crate::db::orders;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::{OrderDetail, OrderWithItems};
use crate::services::checkout::{self, PlaceOrder};
use crate::state::AppState;

/// Build the `/orders` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(create))
        .route("/{id}", get(show))
        .route("/{id}/cancel", post(cancel))
}

/// `GET /orders`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderWithItems>>> {
    let orders = orders::list_for_user(state.pool(), user.id).await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn show(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    orders::get_detail(state.pool(), id, Some(user.id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// `POST /orders`
#[instrument(skip_all, fields(user_id = %user.id, lines = request.items.len()))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let detail =
        checkout::place_order(state.pool(), &state.config().pricing, user.id, &request).await?;

    let order_id = detail.order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", &order_id)]));
    info!(
        order_id = %detail.order.id,
        order_number = %detail.order.order_number,
        total = %detail.order.total_amount,
        "Order placed"
    );

    Ok((StatusCode::CREATED, Json(detail)))
}

/// `POST /orders/{id}/cancel`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Value>> {
    let order =
        checkout::change_status(state.pool(), id, OrderStatus::Cancelled, Some(user.id)).await?;
    info!("Order cancelled by customer");
    Ok(Json(json!({ "message": "Order cancelled successfully", "order": order })))
}
