//! Public catalog: product list and detail.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use ecom_core::{CategoryId, Pagination, ProductId};

use crate::db::products::{self, ProductFilter};
use crate::error::{AppError, Result};
use crate::models::ProductView;
use crate::services::catalog_cache::{ProductPage, list_key};
use crate::state::AppState;

/// Build the `/products` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{id}", get(show))
}

/// Query string for the product list.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl ListQuery {
    pub(crate) fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(Pagination::DEFAULT_LIMIT),
        )
    }
}

/// `GET /products`
///
/// Served from the product list cache when possible.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProductPage>> {
    let page = query.pagination();
    let filter = ProductFilter {
        search: query.search,
        category_id: query.category_id,
    };
    let key = list_key(page.page, page.limit, filter.search_term(), filter.category_id);

    if let Some(cached) = state.catalog().get(&key).await {
        return Ok(Json(ProductPage::clone(&cached)));
    }

    let (products, total) = products::list_public(state.pool(), &filter, page).await?;
    let result = ProductPage {
        products,
        total,
        page: page.page,
        limit: page.limit,
    };
    state.catalog().insert(key, Arc::new(result.clone())).await;

    Ok(Json(result))
}

/// `GET /products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductView>> {
    let product = products::get_public(state.pool(), id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    // A lost view count is not worth failing the request
    if let Err(e) = products::increment_views(state.pool(), id).await {
        warn!(error = %e, product_id = %id, "Failed to increment view count");
    }

    Ok(Json(product))
}
