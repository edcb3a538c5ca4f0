//! E-commerce CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the database if needed and apply migrations
//! ecom-cli migrate run
//!
//! # Show applied and pending migrations
//! ecom-cli migrate status
//!
//! # Load the admin account, categories and products
//! ecom-cli seed
//! ecom-cli seed --file my-catalog.yaml
//!
//! # Create an admin account
//! ecom-cli admin create -e ops@example.com -p 's3cret!' -f Ops -l Team
//! ```
//!
//! All commands read `DATABASE_URL` from the environment (or `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ecom-cli")]
#[command(author, version, about = "E-commerce backend CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Seed the database with an admin account and a starter catalog
    Seed {
        /// YAML catalog file (defaults to the built-in catalog)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Create the database if missing and apply pending migrations
    Run,
    /// List migrations and whether each has been applied
    Status,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Initial password
        #[arg(short, long)]
        password: String,

        /// First name
        #[arg(short, long, default_value = "Admin")]
        first_name: String,

        /// Last name
        #[arg(short, long, default_value = "User")]
        last_name: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { action } => match action {
            MigrateAction::Run => commands::migrate::run().await?,
            MigrateAction::Status => commands::migrate::status().await?,
        },
        Commands::Seed { file } => commands::seed::catalog(file.as_deref()).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                password,
                first_name,
                last_name,
            } => {
                commands::admin::create_user(&email, &password, &first_name, &last_name).await?;
            }
        },
    }
    Ok(())
}
