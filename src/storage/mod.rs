//! Catalog and inquiry persistence
//!
//! One repository trait, one adapter per SQL dialect. Each adapter owns its
//! own table definitions; callers only ever see `Arc<dyn Storage>`.

mod postgres;
mod sqlite;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;

use crate::config::{Config, DatabaseBackend};
use crate::model::{Inquiry, NewInquiry, NewProduct, Product};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => f.write_str("postgres"),
            Dialect::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection failed to {dialect} database: {cause}")]
    ConnectionFailed { dialect: Dialect, cause: String },

    #[error("Schema setup failed on {dialect}: {cause}")]
    SchemaSetupFailed { dialect: Dialect, cause: String },

    #[error("Query on {table} failed: {cause}")]
    QueryFailed { table: &'static str, cause: String },

    #[error("Unreadable row in {table}: {cause}")]
    InvalidRow { table: &'static str, cause: String },

    #[error("Storage task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Repository over the `products` and `inquiries` tables
///
/// Records are insert-only: there is no update or delete.
#[async_trait]
pub trait Storage: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// All products, ordered by id
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// `None` when no product has this id
    async fn get_product(&self, id: i32) -> Result<Option<Product>>;

    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    async fn create_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry>;
}

/// Open the backend named by the configuration and make sure its tables exist
pub async fn connect(config: &Config) -> Result<Arc<dyn Storage>> {
    match &config.database {
        DatabaseBackend::Postgres { url } => {
            let storage = PostgresStorage::connect(url, &config.postgres).await?;
            info!("Connected to PostgreSQL database");
            Ok(Arc::new(storage))
        }
        DatabaseBackend::Sqlite { path } => {
            warn!(
                "Using SQLite fallback at {} - set DATABASE_URL to a PostgreSQL URL for production",
                path.display()
            );
            let storage = SqliteStorage::open(path).await?;
            Ok(Arc::new(storage))
        }
    }
}
