//! Seed the database with an admin account and a starter catalog.
//!
//! The catalog is YAML: an `admin` block, `categories` and `products`
//! referencing categories by name. Seeding is idempotent: rows that already
//! exist (same email, category name or SKU) are skipped.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use ecom_api::db::categories::{self, NewCategory};
use ecom_api::db::products::{self, NewProduct};
use ecom_api::db::RepositoryError;
use ecom_core::CategoryId;

use super::admin::{AdminError, NewAdmin, insert_admin};
use super::connect;

/// Built-in catalog used when no `--file` is given.
const DEFAULT_CATALOG: &str = include_str!("../../seed/catalog.yaml");

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub admin: Option<SeedAdmin>,
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub sku: String,
    /// Category name from the `categories` list.
    pub category: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl SeedProduct {
    fn to_new_product(&self, category_id: Option<CategoryId>) -> NewProduct {
        NewProduct {
            name: self.name.clone(),
            description: self.description.clone(),
            short_description: self.short_description.clone(),
            price: self.price,
            sale_price: self.sale_price,
            sku: self.sku.clone(),
            stock: self.stock,
            min_stock: 0,
            weight: None,
            dimensions: None,
            image_url: self.image_url.clone(),
            category_id,
            brand: self.brand.clone(),
            tags: self.tags.clone(),
            is_featured: self.is_featured,
            is_active: true,
        }
    }
}

/// Parse a catalog and check that every product's category is declared.
///
/// # Errors
///
/// Returns a description of the first problem found.
pub fn parse_catalog(content: &str) -> Result<SeedFile, String> {
    let file: SeedFile = serde_yaml::from_str(content).map_err(|e| e.to_string())?;

    for product in &file.products {
        if let Some(category) = &product.category
            && !file.categories.iter().any(|c| &c.name == category)
        {
            return Err(format!(
                "product {} references unknown category {category}",
                product.sku
            ));
        }
        product.to_new_product(None).validate()?;
    }
    Ok(file)
}

/// Seed from `file`, or the built-in catalog.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a database
/// operation fails.
pub async fn catalog(file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = match file {
        Some(path) => {
            info!(path = %path.display(), "Loading catalog from file");
            tokio::fs::read_to_string(path).await?
        }
        None => DEFAULT_CATALOG.to_owned(),
    };

    // Validate before connecting to the database
    let seed = parse_catalog(&content)?;
    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Parsed catalog"
    );

    let pool = connect().await?;

    if let Some(admin) = &seed.admin {
        seed_admin(&pool, admin).await?;
    }
    let category_ids = seed_categories(&pool, &seed.categories).await?;
    let created = seed_products(&pool, &seed.products, &category_ids).await?;

    info!("Seeding complete!");
    info!("  Products created: {created}");
    Ok(())
}

async fn seed_admin(pool: &PgPool, admin: &SeedAdmin) -> Result<(), AdminError> {
    let result = insert_admin(
        pool,
        &NewAdmin {
            email: &admin.email,
            password: &admin.password,
            first_name: &admin.first_name,
            last_name: &admin.last_name,
            phone: admin.phone.clone(),
            address: admin.address.clone(),
        },
    )
    .await;

    match result {
        Ok(user) => {
            info!("Admin user created: {}", user.email);
            Ok(())
        }
        Err(AdminError::UserExists(email)) => {
            info!("Admin user already exists: {email}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Create missing categories and return every seeded name's id.
async fn seed_categories(
    pool: &PgPool,
    seeds: &[SeedCategory],
) -> Result<HashMap<String, CategoryId>, RepositoryError> {
    let mut ids: HashMap<String, CategoryId> = categories::list_all(pool)
        .await?
        .into_iter()
        .map(|c| (c.name, c.id))
        .collect();

    for seed in seeds {
        if ids.contains_key(&seed.name) {
            info!("Category already exists: {}", seed.name);
            continue;
        }
        let category = categories::create(
            pool,
            &NewCategory {
                name: seed.name.clone(),
                description: seed.description.clone(),
                image_url: seed.image_url.clone(),
                parent_id: None,
                is_active: true,
            },
        )
        .await?;
        info!("Category created: {}", category.name);
        ids.insert(category.name, category.id);
    }
    Ok(ids)
}

async fn seed_products(
    pool: &PgPool,
    seeds: &[SeedProduct],
    category_ids: &HashMap<String, CategoryId>,
) -> Result<usize, RepositoryError> {
    let mut created = 0;
    for seed in seeds {
        let category_id = seed
            .category
            .as_ref()
            .and_then(|name| category_ids.get(name).copied());

        match products::create(pool, &seed.to_new_product(category_id), None).await {
            Ok(product) => {
                created += 1;
                info!(slug = %product.slug, "Product created: {}", product.name);
            }
            Err(RepositoryError::Conflict(reason)) => {
                warn!(sku = %seed.sku, "Skipping product: {reason}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}
