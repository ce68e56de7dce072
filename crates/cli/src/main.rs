//! Vitrine CLI - Catalog management tools.
//!
//! # Usage
//!
//! ```bash
//! # Seed the catalog from the mock product endpoint
//! vitrine-cli seed
//!
//! # Seed from a local YAML or JSON file, only when the catalog is empty
//! vitrine-cli seed --file products.yaml --only-if-empty
//!
//! # List products
//! vitrine-cli products list --limit 20
//!
//! # Delete a product
//! vitrine-cli products delete prod_4OANwRr9Q0lvYL
//! ```
//!
//! # Commands
//!
//! - `seed` - Create products (with their images) in the commerce API
//! - `products list` - List catalog products
//! - `products delete` - Delete a product
//!
//! Commands that write to the catalog need `CHEC_SECRET_KEY`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vitrine-cli")]
#[command(author, version, about = "Vitrine CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the catalog from the mock endpoint or a file
    Seed {
        /// Seed endpoint URL (defaults to `CATALOG_SEED_URL`)
        #[arg(long, conflicts_with = "file")]
        source_url: Option<String>,

        /// Local YAML or JSON file listing the products
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Skip seeding when the catalog already has products
        #[arg(long)]
        only_if_empty: bool,
    },
    /// Manage catalog products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List {
        /// Maximum number of products to list
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
    /// Delete a product
    Delete {
        /// Product ID
        id: String,
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
        Commands::Seed {
            source_url,
            file,
            only_if_empty,
        } => commands::seed::run(source_url, file, only_if_empty).await?,
        Commands::Products { action } => match action {
            ProductsAction::List { limit } => commands::products::list(limit).await?,
            ProductsAction::Delete { id } => commands::products::delete(&id).await?,
        },
    }
    Ok(())
}
