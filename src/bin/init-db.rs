//! Initialize the catalog database and exit
//!
//! Creates the tables for the configured backend and seeds the catalog when
//! it is empty.
//!
//! Usage:
//!   cargo run --bin init-db
//!   cargo run --bin init-db -- --products ./catalog.json

use std::env;
use std::path::{Path, PathBuf};
use std::process::{self, ExitCode};

use anyhow::Context;
use irgadgets_api::config::Config;
use irgadgets_api::seed::{parse_seed_file, seed_if_empty, seed_products_if_empty};
use irgadgets_api::{logging, storage};
use tracing::{error, info};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [--products <file.json>]", program);
    eprintln!();
    eprintln!("Without --products the built-in launch catalog is seeded.");
    process::exit(1);
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let products_file = match args.len() {
        1 => None,
        3 if args[1] == "--products" => Some(PathBuf::from(&args[2])),
        _ => usage(&args[0]),
    };

    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Guards must outlive every log call so the file writers flush on return
    let _log_guards = logging::init(&config.log_dir, &config.log_level, true);

    match run(&config, products_file.as_deref()).await {
        Ok(count) => {
            info!("Database initialization completed ({} products added)", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Database initialization failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, products_file: Option<&Path>) -> anyhow::Result<usize> {
    // Validate the file before touching the database
    let products = match products_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            let products = parse_seed_file(&raw)
                .with_context(|| format!("Invalid seed file {}", path.display()))?;
            Some(products)
        }
        None => None,
    };

    info!("Starting database initialization...");

    let storage = storage::connect(config).await?;

    let count = match products {
        Some(products) => seed_products_if_empty(storage.as_ref(), products).await?,
        None => seed_if_empty(storage.as_ref()).await?,
    };

    Ok(count)
}
