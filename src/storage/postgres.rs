use super::{Dialect, Result, Storage, StorageError};
use crate::config::PostgresSettings;
use crate::model::{Inquiry, NewInquiry, NewProduct, Product};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use deadpool_postgres::{Config as PoolConfig, Object, Pool, Runtime};
use std::time::Duration;
use tokio::time::interval;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

// `created_at` is a plain TIMESTAMP holding UTC, compatible with tables
// created by earlier deployments.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    price TEXT NOT NULL,
    category TEXT NOT NULL,
    image_url TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT (now() AT TIME ZONE 'utc')
);

CREATE TABLE IF NOT EXISTS inquiries (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    message TEXT NOT NULL,
    service_of_interest TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT (now() AT TIME ZONE 'utc')
);
"#;

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image_url, created_at";
const INQUIRY_COLUMNS: &str = "id, name, email, message, service_of_interest, created_at";

pub struct PostgresStorage {
    pool: Pool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str, settings: &PostgresSettings) -> Result<Self> {
        let pool = create_pool(database_url, settings)?;

        let client = pool.get().await.map_err(|e| StorageError::ConnectionFailed {
            dialect: Dialect::Postgres,
            cause: e.to_string(),
        })?;

        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| StorageError::SchemaSetupFailed {
                dialect: Dialect::Postgres,
                cause: e.to_string(),
            })?;

        info!(
            "PostgreSQL schema ready (pool size {}, idle timeout {:?})",
            settings.max_connections, settings.idle_timeout
        );

        spawn_idle_sweep(pool.clone(), settings.idle_timeout);

        Ok(Self { pool })
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                dialect: Dialect::Postgres,
                cause: e.to_string(),
            })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);

        let rows = client
            .query(&sql, &[])
            .await
            .map_err(|e| query_failed("products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn get_product(&self, id: i32) -> Result<Option<Product>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);

        let row = client
            .query_opt(&sql, &[&id])
            .await
            .map_err(|e| query_failed("products", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO products (name, description, price, category, image_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PRODUCT_COLUMNS
        );
        let category = product.category.as_str();

        let row = client
            .query_one(
                &sql,
                &[
                    &product.name,
                    &product.description,
                    &product.price,
                    &category,
                    &product.image_url,
                ],
            )
            .await
            .map_err(|e| query_failed("products", e))?;

        product_from_row(&row)
    }

    async fn create_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry> {
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO inquiries (name, email, message, service_of_interest) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            INQUIRY_COLUMNS
        );

        let row = client
            .query_one(
                &sql,
                &[
                    &inquiry.name,
                    &inquiry.email,
                    &inquiry.message,
                    &inquiry.service_of_interest,
                ],
            )
            .await
            .map_err(|e| query_failed("inquiries", e))?;

        inquiry_from_row(&row)
    }
}

fn create_pool(database_url: &str, settings: &PostgresSettings) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: settings.max_connections as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(settings.connect_timeout),
            create: Some(settings.connect_timeout),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StorageError::ConnectionFailed {
            dialect: Dialect::Postgres,
            cause: format!("Failed to create pool: {}", e),
        })
}

/// Drop pooled connections that have sat unused longer than `idle_timeout`
fn spawn_idle_sweep(pool: Pool, idle_timeout: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(idle_timeout.max(Duration::from_secs(1)));

        loop {
            ticker.tick().await;
            let result = pool.retain(|_, metrics| metrics.last_used() < idle_timeout);
            if !result.removed.is_empty() {
                debug!("Retired {} idle PostgreSQL connections", result.removed.len());
            }
        }
    });
}

fn query_failed(table: &'static str, err: tokio_postgres::Error) -> StorageError {
    StorageError::QueryFailed {
        table,
        cause: err.to_string(),
    }
}

fn invalid_row(table: &'static str) -> impl Fn(tokio_postgres::Error) -> StorageError {
    move |err| StorageError::InvalidRow {
        table,
        cause: err.to_string(),
    }
}

fn product_from_row(row: &Row) -> Result<Product> {
    let invalid = invalid_row("products");
    let category: String = row.try_get("category").map_err(&invalid)?;
    let created_at: NaiveDateTime = row.try_get("created_at").map_err(&invalid)?;

    Ok(Product {
        id: row.try_get("id").map_err(&invalid)?,
        name: row.try_get("name").map_err(&invalid)?,
        description: row.try_get("description").map_err(&invalid)?,
        price: row.try_get("price").map_err(&invalid)?,
        category: category.parse().map_err(|e| StorageError::InvalidRow {
            table: "products",
            cause: format!("{}", e),
        })?,
        image_url: row.try_get("image_url").map_err(&invalid)?,
        created_at: created_at.and_utc(),
    })
}

fn inquiry_from_row(row: &Row) -> Result<Inquiry> {
    let invalid = invalid_row("inquiries");
    let created_at: NaiveDateTime = row.try_get("created_at").map_err(&invalid)?;

    Ok(Inquiry {
        id: row.try_get("id").map_err(&invalid)?,
        name: row.try_get("name").map_err(&invalid)?,
        email: row.try_get("email").map_err(&invalid)?,
        message: row.try_get("message").map_err(&invalid)?,
        service_of_interest: row.try_get("service_of_interest").map_err(&invalid)?,
        created_at: created_at.and_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductCategory;

    fn settings() -> PostgresSettings {
        PostgresSettings {
            max_connections: 2,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(20),
        }
    }

    #[test]
    fn test_create_pool_rejects_malformed_url() {
        let err = create_pool("not a url at all ://", &settings()).err();
        assert!(matches!(err, Some(StorageError::ConnectionFailed { .. })));
    }

    /// Needs a scratch database: TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_round_trip_against_live_database() {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => return,
        };
        let storage = PostgresStorage::connect(&url, &settings()).await.unwrap();

        let created = storage
            .create_product(NewProduct {
                name: "Network Setup".to_string(),
                description: "Office networking".to_string(),
                price: "$300".to_string(),
                category: ProductCategory::Hardware,
                image_url: "https://example.com/net.jpg".to_string(),
            })
            .await
            .unwrap();

        let fetched = storage.get_product(created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
        assert_eq!(storage.get_product(i32::MAX).await.unwrap(), None);
    }
}
