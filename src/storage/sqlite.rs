use super::{Dialect, Result, Storage, StorageError};
use crate::model::{Inquiry, NewInquiry, NewProduct, Product};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

type Migration = fn(&Connection) -> rusqlite::Result<()>;

const MIGRATIONS: &[(i32, Migration)] = &[(1, create_tables), (2, add_missing_created_at)];

const NOW_UTC: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        price TEXT NOT NULL,
        category TEXT NOT NULL,
        image_url TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS inquiries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        message TEXT NOT NULL,
        service_of_interest TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
"#;

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(TABLES_SQL)
}

/// Tables created without a `created_at` column get one, backfilled with the migration time
///
/// SQLite cannot add a column with a non-constant default, so the column is
/// nullable here and inserts always stamp it explicitly.
fn add_missing_created_at(conn: &Connection) -> rusqlite::Result<()> {
    for table in ["products", "inquiries"] {
        let has_column = conn
            .prepare(&format!("PRAGMA table_info({})", table))?
            .query_map([], |r| r.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .iter()
            .any(|name| name == "created_at");

        if has_column {
            continue;
        }

        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN created_at TEXT; \
             UPDATE {table} SET created_at = {now} WHERE created_at IS NULL;",
            table = table,
            now = NOW_UTC,
        ))?;
        info!("Added created_at to legacy {} table", table);
    }

    Ok(())
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image_url, created_at";
const INQUIRY_COLUMNS: &str = "id, name, email, message, service_of_interest, created_at";

/// Single connection guarded by a mutex; SQLite allows one writer anyway
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::ConnectionFailed {
                    dialect: Dialect::Sqlite,
                    cause: format!("Failed to create {}: {}", parent.display(), e),
                })?;
            }

            let conn = Connection::open(&path).map_err(|e| StorageError::ConnectionFailed {
                dialect: Dialect::Sqlite,
                cause: e.to_string(),
            })?;
            info!("Opened SQLite database at {}", path.display());
            Ok::<_, StorageError>(conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))??;

        Self::from_connection(conn)
    }

    /// Private database that disappears with the handle
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::ConnectionFailed {
            dialect: Dialect::Sqlite,
            cause: e.to_string(),
        })?;

        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Task("SQLite connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let setup_failed = |e: rusqlite::Error| StorageError::SchemaSetupFailed {
        dialect: Dialect::Sqlite,
        cause: e.to_string(),
    };

    let tx = conn.transaction().map_err(setup_failed)?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        [],
    )
    .map_err(setup_failed)?;

    let applied: Vec<i32> = tx
        .prepare("SELECT version FROM schema_migrations ORDER BY version")
        .map_err(setup_failed)?
        .query_map([], |r| r.get(0))
        .map_err(setup_failed)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(setup_failed)?;

    for (version, migrate) in MIGRATIONS {
        if applied.contains(version) {
            continue;
        }

        migrate(&tx).map_err(setup_failed)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )
        .map_err(setup_failed)?;

        debug!("Applied SQLite migration {}", version);
    }

    tx.commit().map_err(setup_failed)?;
    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);
            let mut stmt = conn.prepare(&sql).map_err(query_failed("products"))?;
            let rows = stmt
                .query_map([], product_from_row)
                .map_err(query_failed("products"))?;

            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(row_failed("products"))
        })
        .await
    }

    async fn get_product(&self, id: i32) -> Result<Option<Product>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
            conn.query_row(&sql, [id], product_from_row)
                .optional()
                .map_err(row_failed("products"))
        })
        .await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        self.with_conn(move |conn| {
            let sql = format!(
                "INSERT INTO products (name, description, price, category, image_url, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, {}) RETURNING {}",
                NOW_UTC, PRODUCT_COLUMNS
            );
            conn.query_row(
                &sql,
                params![
                    product.name,
                    product.description,
                    product.price,
                    product.category.as_str(),
                    product.image_url,
                ],
                product_from_row,
            )
            .map_err(query_failed("products"))
        })
        .await
    }

    async fn create_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry> {
        self.with_conn(move |conn| {
            let sql = format!(
                "INSERT INTO inquiries (name, email, message, service_of_interest, created_at) \
                 VALUES (?1, ?2, ?3, ?4, {}) RETURNING {}",
                NOW_UTC, INQUIRY_COLUMNS
            );
            conn.query_row(
                &sql,
                params![
                    inquiry.name,
                    inquiry.email,
                    inquiry.message,
                    inquiry.service_of_interest,
                ],
                inquiry_from_row,
            )
            .map_err(query_failed("inquiries"))
        })
        .await
    }
}

fn query_failed(table: &'static str) -> impl Fn(rusqlite::Error) -> StorageError {
    move |err| StorageError::QueryFailed {
        table,
        cause: err.to_string(),
    }
}

/// Rows whose columns fail to convert are `InvalidRow`; anything else is a query failure
fn row_failed(table: &'static str) -> impl Fn(rusqlite::Error) -> StorageError {
    move |err| match err {
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            StorageError::InvalidRow {
                table,
                cause: err.to_string(),
            }
        }
        other => StorageError::QueryFailed {
            table,
            cause: other.to_string(),
        },
    }
}

/// Surface a column that parsed as text but not as the expected value
fn conversion_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let category: String = row.get(4)?;

    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: category.parse().map_err(|e| conversion_error(4, e))?,
        image_url: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
    })
}

fn inquiry_from_row(row: &Row<'_>) -> rusqlite::Result<Inquiry> {
    Ok(Inquiry {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        service_of_interest: row.get(4)?,
        created_at: parse_timestamp(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductCategory;
    use tokio_test::assert_ok;

    fn repair_service() -> NewProduct {
        NewProduct {
            name: "Computer Repair & Diagnostics".to_string(),
            description: "Hardware and software troubleshooting".to_string(),
            price: "Starts at $50".to_string(),
            category: ProductCategory::Service,
            image_url: "https://example.com/repair.jpg".to_string(),
        }
    }

    fn contact(service: Option<&str>) -> NewInquiry {
        NewInquiry {
            name: "John".to_string(),
            email: "john@x.com".to_string(),
            message: "help".to_string(),
            service_of_interest: service.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_product_preserves_fields() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let input = repair_service();

        let created = storage.create_product(input.clone()).await.unwrap();

        assert!(created.id > 0);
        assert_eq!(created.name, input.name);
        assert_eq!(created.description, input.description);
        assert_eq!(created.price, input.price);
        assert_eq!(created.category, input.category);
        assert_eq!(created.image_url, input.image_url);
    }

    #[tokio::test]
    async fn test_get_product_by_id() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let created = storage.create_product(repair_service()).await.unwrap();

        let fetched = storage.get_product(created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_get_missing_product_is_none() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(storage.get_product(999_999).await.unwrap(), None);
        assert_eq!(storage.get_product(-1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_products_in_id_order() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.list_products().await.unwrap().is_empty());

        let mut second = repair_service();
        second.name = "SaaS Platform Subscription".to_string();
        second.category = ProductCategory::Saas;

        let a = storage.create_product(repair_service()).await.unwrap();
        let b = storage.create_product(second).await.unwrap();

        let listed = storage.list_products().await.unwrap();
        assert_eq!(listed, vec![a, b]);
    }

    #[tokio::test]
    async fn test_inquiry_without_service_of_interest() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let created = storage.create_inquiry(contact(None)).await.unwrap();

        assert_eq!(created.name, "John");
        assert_eq!(created.email, "john@x.com");
        assert_eq!(created.service_of_interest, None);
    }

    #[tokio::test]
    async fn test_identical_inquiries_are_not_deduplicated() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let first = storage.create_inquiry(contact(Some("Repair"))).await.unwrap();
        let second = storage.create_inquiry(contact(Some("Repair"))).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.service_of_interest.as_deref(), Some("Repair"));
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");

        let created = {
            let storage = SqliteStorage::open(&path).await.unwrap();
            storage.create_product(repair_service()).await.unwrap()
        };

        let reopened = assert_ok!(SqliteStorage::open(&path).await);
        let listed = reopened.list_products().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_legacy_tables_without_created_at_are_upgraded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE products (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    price TEXT NOT NULL,
                    category TEXT NOT NULL,
                    image_url TEXT NOT NULL
                 );
                 CREATE TABLE inquiries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    message TEXT NOT NULL,
                    service_of_interest TEXT
                 );
                 INSERT INTO products (name, description, price, category, image_url)
                 VALUES ('Old listing', 'Kept from before', '$10', 'service', 'https://example.com/old.jpg');",
            )
            .unwrap();
        }

        let storage = assert_ok!(SqliteStorage::open(&path).await);

        let listed = storage.list_products().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Old listing");

        let created = storage.create_product(repair_service()).await.unwrap();
        assert_eq!(storage.get_product(created.id).await.unwrap(), Some(created));
        assert_ok!(storage.create_inquiry(contact(None)).await);
    }

    #[tokio::test]
    async fn test_unknown_category_in_table_is_reported() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO products (name, description, price, category, image_url) \
                     VALUES ('x', 'y', '$1', 'test', 'https://example.com')",
                    [],
                )
                .map_err(query_failed("products"))
            })
            .await
            .unwrap();

        let err = storage.list_products().await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRow { table: "products", .. }));

        let id: i32 = storage
            .with_conn(|conn| {
                conn.query_row("SELECT MAX(id) FROM products", [], |r| r.get(0))
                    .map_err(query_failed("products"))
            })
            .await
            .unwrap();
        let err = storage.get_product(id).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRow { table: "products", .. }));
    }
}
