//! Order administration: list, inspect and move orders through fulfillment.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use ecom_core::{OrderId, OrderStatus, Pagination};

use crate::db::orders;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::OrderDetail;
use crate::services::checkout;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{id}", get(show))
        .route("/{id}/status", put(update_status))
}

/// Query string for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// `GET /admin/orders`
#[instrument(skip_all, fields(admin_id = %admin.id, status = ?query.status))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Value>> {
    let page = Pagination::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(Pagination::DEFAULT_LIMIT),
    );
    let (orders, total) = orders::list_all(state.pool(), query.status, page).await?;
    Ok(Json(json!({ "orders": orders, "pagination": page.info(total) })))
}

/// `GET /admin/orders/{id}`
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    orders::get_detail(state.pool(), id, None)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// `PUT /admin/orders/{id}/status`
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id, status = %change.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Value>> {
    let order = checkout::change_status(state.pool(), id, change.status, None).await?;

    let order_id = order.id.to_string();
    add_breadcrumb(
        "orders",
        "Order status changed",
        Some(&[("order_id", &order_id), ("status", order.status.as_str())]),
    );
    info!("Order status updated");

    Ok(Json(json!({ "message": "Order status updated successfully", "order": order })))
}
