//! Category queries.

use serde::Deserialize;
use sqlx::PgPool;

use ecom_core::CategoryId;

use super::RepositoryError;
use crate::models::Category;

const CATEGORY_COLUMNS: &str =
    "id, name, description, image_url, parent_id, is_active, created_at, updated_at";

const NAME_TAKEN: &str = "Category name already exists";

/// Fields for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Partial category update. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: Option<bool>,
}

/// What still references a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryUsage {
    pub products: i64,
    pub children: i64,
}

/// Active categories for the public catalog, by name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Category>, RepositoryError> {
    let rows = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories \
         WHERE is_active AND deleted_at IS NULL ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All live categories, including inactive ones.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(pool: &PgPool) -> Result<Vec<Category>, RepositoryError> {
    let rows = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE deleted_at IS NULL ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Get a live category.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(pool: &PgPool, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
    let row = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Create a category.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the name is taken.
pub async fn create(pool: &PgPool, new: &NewCategory) -> Result<Category, RepositoryError> {
    sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (name, description, image_url, parent_id, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(new.name.trim())
    .bind(&new.description)
    .bind(&new.image_url)
    .bind(new.parent_id)
    .bind(new.is_active)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, NAME_TAKEN))
}

/// Update a category.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category does not exist and
/// `RepositoryError::Conflict` if the new name is taken.
pub async fn update(
    pool: &PgPool,
    id: CategoryId,
    update: &CategoryUpdate,
) -> Result<Category, RepositoryError> {
    sqlx::query_as::<_, Category>(&format!(
        "UPDATE categories SET \
             name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             image_url = COALESCE($4, image_url), \
             parent_id = COALESCE($5, parent_id), \
             is_active = COALESCE($6, is_active), \
             updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name.as_deref().map(str::trim))
    .bind(&update.description)
    .bind(&update.image_url)
    .bind(update.parent_id)
    .bind(update.is_active)
    .fetch_optional(pool)
    .await
    .map_err(|e| RepositoryError::unique_violation(e, NAME_TAKEN))?
    .ok_or(RepositoryError::NotFound)
}

/// Whether `candidate` sits anywhere below `ancestor` in the tree.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn is_descendant(
    pool: &PgPool,
    ancestor: CategoryId,
    candidate: CategoryId,
) -> Result<bool, RepositoryError> {
    let (found,): (bool,) = sqlx::query_as(
        "WITH RECURSIVE descendants AS ( \
             SELECT id FROM categories WHERE parent_id = $1 AND deleted_at IS NULL \
             UNION \
             SELECT c.id FROM categories c \
             JOIN descendants d ON c.parent_id = d.id \
             WHERE c.deleted_at IS NULL \
         ) \
         SELECT EXISTS (SELECT 1 FROM descendants WHERE id = $2)",
    )
    .bind(ancestor)
    .bind(candidate)
    .fetch_one(pool)
    .await?;
    Ok(found)
}

/// Count live products and child categories under a category.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn usage(pool: &PgPool, id: CategoryId) -> Result<CategoryUsage, RepositoryError> {
    let (products, children): (i64, i64) = sqlx::query_as(
        "SELECT \
             (SELECT COUNT(*) FROM products WHERE category_id = $1 AND deleted_at IS NULL), \
             (SELECT COUNT(*) FROM categories WHERE parent_id = $1 AND deleted_at IS NULL)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(CategoryUsage { products, children })
}

/// Soft-delete a category.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category does not exist.
pub async fn soft_delete(pool: &PgPool, id: CategoryId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE categories SET deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
