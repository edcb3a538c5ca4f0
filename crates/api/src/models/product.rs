//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use ecom_core::{CategoryId, PartnerId, ProductId};

use super::category::CategoryRef;

/// A product as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub sku: String,
    pub stock: i32,
    pub min_stock: i32,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub partner_id: Option<PartnerId>,
    pub brand: Option<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub view_count: i32,
    pub rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price the shopper pays: the sale price when it undercuts the list price.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    /// Whether stock has dropped to the reorder threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// A product with its category resolved, as returned by the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<CategoryRef>,
}

#[cfg(test)]
pub(crate) fn sample_product(id: i32, price: i64, sale_price: Option<i64>, stock: i32) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        slug: format!("product-{id}"),
        description: None,
        short_description: None,
        price: Decimal::from(price),
        sale_price: sale_price.map(Decimal::from),
        sku: format!("SKU{id:04}"),
        stock,
        min_stock: 5,
        weight: None,
        dimensions: None,
        image_url: None,
        category_id: None,
        partner_id: None,
        brand: None,
        tags: Vec::new(),
        is_featured: false,
        is_active: true,
        view_count: 0,
        rating: Decimal::ZERO,
        review_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_price_uses_lower_sale_price() {
        assert_eq!(sample_product(1, 1000, Some(800), 1).effective_price(), Decimal::from(800));
    }

    #[test]
    fn test_effective_price_ignores_higher_sale_price() {
        assert_eq!(sample_product(1, 1000, Some(1200), 1).effective_price(), Decimal::from(1000));
        assert_eq!(sample_product(1, 1000, None, 1).effective_price(), Decimal::from(1000));
    }

    #[test]
    fn test_low_stock() {
        assert!(sample_product(1, 10, None, 5).is_low_stock());
        assert!(!sample_product(1, 10, None, 6).is_low_stock());
    }
}
