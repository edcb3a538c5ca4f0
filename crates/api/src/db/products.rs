//! Product queries.
//!
//! Every query aliases `products` as `p` so the shared column list works for
//! plain selects, joins and `RETURNING` clauses alike.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use ecom_core::{CategoryId, Pagination, PartnerId, ProductId, slugify};

use super::RepositoryError;
use crate::models::{CategoryRef, Product, ProductView};

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, \
     p.short_description, p.price, p.sale_price, p.sku, p.stock, p.min_stock, p.weight, \
     p.dimensions, p.image_url, p.category_id, p.partner_id, p.brand, p.tags, p.is_featured, \
     p.is_active, p.view_count, p.rating, p.review_count, p.created_at, p.updated_at";

/// Catalog filters from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl ProductFilter {
    /// Search term with surrounding whitespace removed; blank means no search.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Fields for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub sku: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub min_stock: i32,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewProduct {
    /// Check required fields and ranges.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Product name is required".to_string());
        }
        if self.sku.trim().is_empty() {
            return Err("SKU is required".to_string());
        }
        validate_amounts(Some(self.price), self.sale_price, Some(self.stock))
    }
}

/// Partial product update. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sku: Option<String>,
    pub stock: Option<i32>,
    pub min_stock: Option<i32>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// Check ranges of the fields being changed.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("Product name cannot be empty".to_string());
        }
        if self.sku.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err("SKU cannot be empty".to_string());
        }
        validate_amounts(self.price, self.sale_price, self.stock)
    }
}

fn validate_amounts(
    price: Option<Decimal>,
    sale_price: Option<Decimal>,
    stock: Option<i32>,
) -> Result<(), String> {
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err("Price must not be negative".to_string());
    }
    if sale_price.is_some_and(|p| p.is_sign_negative()) {
        return Err("Sale price must not be negative".to_string());
    }
    if stock.is_some_and(|s| s < 0) {
        return Err("Stock must not be negative".to_string());
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    #[sqlx(flatten)]
    product: Product,
    category_name: Option<String>,
}

impl From<ProductRow> for ProductView {
    fn from(row: ProductRow) -> Self {
        let category = row
            .product
            .category_id
            .zip(row.category_name)
            .map(|(id, name)| CategoryRef { id, name });
        Self {
            product: row.product,
            category,
        }
    }
}

/// Map unique violations on products to the field that clashed.
fn product_conflict(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        let message = if db_err.constraint().is_some_and(|c| c.contains("sku")) {
            "SKU already exists"
        } else {
            "Slug already exists"
        };
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// Active products for the public catalog, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_public(
    pool: &PgPool,
    filter: &ProductFilter,
    page: Pagination,
) -> Result<(Vec<ProductView>, i64), RepositoryError> {
    let pattern = filter.search_term().map(|s| format!("%{}%", escape_like(s)));

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS}, c.name AS category_name \
         FROM products p LEFT JOIN categories c ON c.id = p.category_id \
         WHERE p.is_active AND p.deleted_at IS NULL \
           AND ($1::TEXT IS NULL OR p.name ILIKE $1) \
           AND ($2::INTEGER IS NULL OR p.category_id = $2) \
         ORDER BY p.created_at DESC, p.id DESC LIMIT $3 OFFSET $4"
    ))
    .bind(&pattern)
    .bind(filter.category_id)
    .bind(page.normalized().limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products p \
         WHERE p.is_active AND p.deleted_at IS NULL \
           AND ($1::TEXT IS NULL OR p.name ILIKE $1) \
           AND ($2::INTEGER IS NULL OR p.category_id = $2)",
    )
    .bind(&pattern)
    .bind(filter.category_id)
    .fetch_one(pool)
    .await?;

    Ok((rows.into_iter().map(ProductView::from).collect(), total))
}

/// An active product with its category.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_public(
    pool: &PgPool,
    id: ProductId,
) -> Result<Option<ProductView>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS}, c.name AS category_name \
         FROM products p LEFT JOIN categories c ON c.id = p.category_id \
         WHERE p.id = $1 AND p.is_active AND p.deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(ProductView::from))
}

/// Any live product, active or not.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(pool: &PgPool, id: ProductId) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1 AND p.deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Record a product page view.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn increment_views(pool: &PgPool, id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE products SET view_count = view_count + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Inactive products awaiting approval, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_pending(
    pool: &PgPool,
    page: Pagination,
) -> Result<(Vec<ProductView>, i64), RepositoryError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS}, c.name AS category_name \
         FROM products p LEFT JOIN categories c ON c.id = p.category_id \
         WHERE NOT p.is_active AND p.deleted_at IS NULL \
         ORDER BY p.created_at, p.id LIMIT $1 OFFSET $2"
    ))
    .bind(page.normalized().limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE NOT is_active AND deleted_at IS NULL",
    )
    .fetch_one(pool)
    .await?;

    Ok((rows.into_iter().map(ProductView::from).collect(), total))
}

/// A partner's own products, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_by_partner(
    pool: &PgPool,
    partner_id: PartnerId,
) -> Result<Vec<Product>, RepositoryError> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p \
         WHERE p.partner_id = $1 AND p.deleted_at IS NULL \
         ORDER BY p.created_at DESC, p.id DESC"
    ))
    .bind(partner_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Pick the first slug not in `taken`: `base`, then `base-2`, `base-3`, ...
#[must_use]
pub fn next_free_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == base) {
        return base.to_owned();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.iter().any(|s| s == candidate))
        .unwrap_or_else(|| base.to_owned())
}

/// Escape `%`, `_` and `\` for use inside a `LIKE` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

async fn unique_slug(pool: &PgPool, name: &str) -> Result<String, RepositoryError> {
    let base = slugify(name);
    let taken: Vec<(String,)> =
        sqlx::query_as("SELECT slug FROM products WHERE slug = $1 OR slug LIKE $2")
            .bind(&base)
            .bind(format!("{}-%", escape_like(&base)))
            .fetch_all(pool)
            .await?;
    let taken: Vec<String> = taken.into_iter().map(|(s,)| s).collect();
    Ok(next_free_slug(&base, &taken))
}

/// Create a product, optionally owned by a partner.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the SKU is taken.
pub async fn create(
    pool: &PgPool,
    new: &NewProduct,
    partner_id: Option<PartnerId>,
) -> Result<Product, RepositoryError> {
    let slug = unique_slug(pool, &new.name).await?;

    sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products AS p \
             (name, slug, description, short_description, price, sale_price, sku, stock, \
              min_stock, weight, dimensions, image_url, category_id, partner_id, brand, tags, \
              is_featured, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(new.name.trim())
    .bind(&slug)
    .bind(&new.description)
    .bind(&new.short_description)
    .bind(new.price)
    .bind(new.sale_price)
    .bind(new.sku.trim())
    .bind(new.stock)
    .bind(new.min_stock)
    .bind(new.weight)
    .bind(&new.dimensions)
    .bind(&new.image_url)
    .bind(new.category_id)
    .bind(partner_id)
    .bind(&new.brand)
    .bind(&new.tags)
    .bind(new.is_featured)
    .bind(new.is_active)
    .fetch_one(pool)
    .await
    .map_err(product_conflict)
}

/// Update a product. With `owner` set, only that partner's product matches.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if no matching product exists and
/// `RepositoryError::Conflict` if the new SKU is taken.
pub async fn update(
    pool: &PgPool,
    id: ProductId,
    update: &ProductUpdate,
    owner: Option<PartnerId>,
) -> Result<Product, RepositoryError> {
    sqlx::query_as::<_, Product>(&format!(
        "UPDATE products AS p SET \
             name = COALESCE($2, p.name), \
             description = COALESCE($3, p.description), \
             short_description = COALESCE($4, p.short_description), \
             price = COALESCE($5, p.price), \
             sale_price = COALESCE($6, p.sale_price), \
             sku = COALESCE($7, p.sku), \
             stock = COALESCE($8, p.stock), \
             min_stock = COALESCE($9, p.min_stock), \
             weight = COALESCE($10, p.weight), \
             dimensions = COALESCE($11, p.dimensions), \
             image_url = COALESCE($12, p.image_url), \
             category_id = COALESCE($13, p.category_id), \
             brand = COALESCE($14, p.brand), \
             tags = COALESCE($15, p.tags), \
             is_featured = COALESCE($16, p.is_featured), \
             is_active = COALESCE($17, p.is_active), \
             updated_at = NOW() \
         WHERE p.id = $1 AND p.deleted_at IS NULL \
           AND ($18::INTEGER IS NULL OR p.partner_id = $18) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name.as_deref().map(str::trim))
    .bind(&update.description)
    .bind(&update.short_description)
    .bind(update.price)
    .bind(update.sale_price)
    .bind(update.sku.as_deref().map(str::trim))
    .bind(update.stock)
    .bind(update.min_stock)
    .bind(update.weight)
    .bind(&update.dimensions)
    .bind(&update.image_url)
    .bind(update.category_id)
    .bind(&update.brand)
    .bind(&update.tags)
    .bind(update.is_featured)
    .bind(update.is_active)
    .bind(owner)
    .fetch_optional(pool)
    .await
    .map_err(product_conflict)?
    .ok_or(RepositoryError::NotFound)
}

/// Mark a product active.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn approve(pool: &PgPool, id: ProductId) -> Result<Product, RepositoryError> {
    sqlx::query_as::<_, Product>(&format!(
        "UPDATE products AS p SET is_active = TRUE, updated_at = NOW() \
         WHERE p.id = $1 AND p.deleted_at IS NULL \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Soft-delete a product and drop it from every cart.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn soft_delete(pool: &PgPool, id: ProductId) -> Result<(), RepositoryError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE products SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    sqlx::query("DELETE FROM cart_items WHERE product_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_free_slug_prefers_base() {
        assert_eq!(next_free_slug("iphone-15-pro", &[]), "iphone-15-pro");
        assert_eq!(
            next_free_slug("iphone-15-pro", &["iphone-15-pro-2".to_string()]),
            "iphone-15-pro"
        );
    }

    #[test]
    fn test_next_free_slug_skips_taken_suffixes() {
        let taken = vec![
            "clean-code".to_string(),
            "clean-code-2".to_string(),
            "clean-code-4".to_string(),
        ];
        assert_eq!(next_free_slug("clean-code", &taken), "clean-code-3");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("iphone"), "iphone");
    }

    #[test]
    fn test_search_term_ignores_blank() {
        let filter = ProductFilter {
            search: Some("   ".to_string()),
            category_id: None,
        };
        assert_eq!(filter.search_term(), None);

        let filter = ProductFilter {
            search: Some(" phone ".to_string()),
            category_id: None,
        };
        assert_eq!(filter.search_term(), Some("phone"));
    }

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            name: "Desk Lamp".to_string(),
            description: None,
            short_description: None,
            price: Decimal::from(350_000),
            sale_price: None,
            sku: "LAMP001".to_string(),
            stock: 3,
            min_stock: 0,
            weight: None,
            dimensions: None,
            image_url: None,
            category_id: None,
            brand: None,
            tags: Vec::new(),
            is_featured: false,
            is_active: true,
        };
        assert!(product.validate().is_ok());

        product.price = Decimal::from(-1);
        assert_eq!(product.validate(), Err("Price must not be negative".to_string()));

        product.price = Decimal::ONE;
        product.sku = " ".to_string();
        assert_eq!(product.validate(), Err("SKU is required".to_string()));
    }

    #[test]
    fn test_update_validation_only_checks_present_fields() {
        assert!(ProductUpdate::default().validate().is_ok());

        let update = ProductUpdate {
            stock: Some(-5),
            ..ProductUpdate::default()
        };
        assert_eq!(update.validate(), Err("Stock must not be negative".to_string()));
    }
}
