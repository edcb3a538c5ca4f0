//! In-memory cache for the public product list.
//!
//! Entries are keyed by the full query (page, limit, search, category) and
//! expire after the configured TTL. Any catalog write clears the whole cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::debug;

use ecom_core::CategoryId;

use crate::models::ProductView;

/// One cached page of the product list.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Cache key for a product list query.
#[must_use]
pub fn list_key(page: i64, limit: i64, search: Option<&str>, category: Option<CategoryId>) -> String {
    format!(
        "products:list:page:{page}:limit:{limit}:search:{}:category:{}",
        search.unwrap_or_default(),
        category.map(|c| c.to_string()).unwrap_or_default()
    )
}

/// Shared product list cache.
#[derive(Clone)]
pub struct CatalogCache {
    lists: Cache<String, Arc<ProductPage>>,
}

impl CatalogCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            lists: Cache::builder()
                .max_capacity(1000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached page for `key`, if present and fresh.
    pub async fn get(&self, key: &str) -> Option<Arc<ProductPage>> {
        let hit = self.lists.get(key).await;
        debug!(key, hit = hit.is_some(), "product list cache lookup");
        hit
    }

    /// Store a page under `key`.
    pub async fn insert(&self, key: String, page: Arc<ProductPage>) {
        self.lists.insert(key, page).await;
    }

    /// Drop every cached list.
    pub fn invalidate_all(&self) {
        self.lists.invalidate_all();
        debug!("product list cache cleared");
    }
}
