//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! ecom-cli migrate run
//! ecom-cli migrate status
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! Migrations live in `crates/api/migrations/` and are embedded in the
//! binary, so the CLI and the server always agree on the schema.

use std::collections::HashSet;

use secrecy::ExposeSecret;
use sqlx::migrate::{Migrate, MigrateDatabase};
use sqlx::Postgres;
use thiserror::Error;

use ecom_api::db::MIGRATOR;

use super::{CommandError, connect, database_url};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Create the database if it does not exist, then apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database cannot be created or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let url = database_url()?;
    if !Postgres::database_exists(url.expose_secret()).await? {
        tracing::info!("Database does not exist, creating it...");
        Postgres::create_database(url.expose_secret()).await?;
    }

    let pool = connect().await?;
    tracing::info!("Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}

/// Log every embedded migration with its applied state.
///
/// # Errors
///
/// Returns an error if the migration history cannot be read.
pub async fn status() -> Result<(), MigrationError> {
    let pool = connect().await?;
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;

    let applied: HashSet<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();

    let mut pending = 0;
    for migration in MIGRATOR.iter() {
        if applied.contains(&migration.version) {
            tracing::info!("  [applied] {} {}", migration.version, migration.description);
        } else {
            pending += 1;
            tracing::info!("  [pending] {} {}", migration.version, migration.description);
        }
    }

    tracing::info!(pending, "Migration status");
    Ok(())
}
