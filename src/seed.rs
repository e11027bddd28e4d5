//! Starter catalog
//!
//! Rules:
//! - Seeding only happens when the products table is empty
//! - Inquiries are never seeded

use crate::model::{NewProduct, ProductCategory};
use crate::storage::{Result, Storage};
use crate::validation::{parse_new_product, ValidationError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SeedFileError {
    #[error("Seed file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Seed file must contain a JSON array of products")]
    NotAnArray,

    #[error("Product at index {index} is invalid: {error}")]
    InvalidProduct { index: usize, error: ValidationError },
}

/// The storefront's launch catalog
pub fn default_products() -> Vec<NewProduct> {
    vec![
        NewProduct {
            name: "Computer Repair & Diagnostics".to_string(),
            description: "Comprehensive hardware and software troubleshooting for desktops and laptops. We fix crashes, slow performance, and hardware failures.".to_string(),
            price: "Starts at $50".to_string(),
            category: ProductCategory::Service,
            image_url: "https://images.unsplash.com/photo-1597872252721-240bcdd23f96?auto=format&fit=crop&q=80".to_string(),
        },
        NewProduct {
            name: "Custom Website Development".to_string(),
            description: "Professional, responsive websites tailored to your business needs. From landing pages to full e-commerce solutions.".to_string(),
            price: "Contact for Quote".to_string(),
            category: ProductCategory::Software,
            image_url: "https://images.unsplash.com/photo-1547658719-da2b51169166?auto=format&fit=crop&q=80".to_string(),
        },
        NewProduct {
            name: "Mobile App Development".to_string(),
            description: "Native and cross-platform mobile applications for iOS and Android. Bring your app idea to life.".to_string(),
            price: "Contact for Quote".to_string(),
            category: ProductCategory::Software,
            image_url: "https://images.unsplash.com/photo-1512941937669-90a1b58e7e9c?auto=format&fit=crop&q=80".to_string(),
        },
        NewProduct {
            name: "SaaS Platform Subscription".to_string(),
            description: "Access our suite of productivity tools designed to streamline your business operations.".to_string(),
            price: "$29/month".to_string(),
            category: ProductCategory::Saas,
            image_url: "https://images.unsplash.com/photo-1460925895917-afdab827c52f?auto=format&fit=crop&q=80".to_string(),
        },
        NewProduct {
            name: "IT Maintenance Package".to_string(),
            description: "Ongoing support and maintenance for your business infrastructure. Includes regular updates and security checks.".to_string(),
            price: "$199/month".to_string(),
            category: ProductCategory::Maintenance,
            image_url: "https://images.unsplash.com/photo-1550751827-4bd374c3f58b?auto=format&fit=crop&q=80".to_string(),
        },
    ]
}

/// Seed the launch catalog; returns how many products were inserted
pub async fn seed_if_empty(storage: &dyn Storage) -> Result<usize> {
    seed_products_if_empty(storage, default_products()).await
}

/// Insert `products` in order, unless the catalog already has entries
pub async fn seed_products_if_empty(
    storage: &dyn Storage,
    products: Vec<NewProduct>,
) -> Result<usize> {
    let existing = storage.list_products().await?;
    if !existing.is_empty() {
        info!(
            "Catalog already initialized with {} products, skipping seed",
            existing.len()
        );
        return Ok(0);
    }

    let total = products.len();
    for product in products {
        let created = storage.create_product(product).await?;
        debug!("Added product {}: {}", created.id, created.name);
    }

    info!("Seeded {} products into {} catalog", total, storage.dialect());
    Ok(total)
}

/// Read a JSON array of catalog entries, validating each one
pub fn parse_seed_file(raw: &str) -> std::result::Result<Vec<NewProduct>, SeedFileError> {
    let entries = match serde_json::from_str::<Value>(raw)? {
        Value::Array(entries) => entries,
        _ => return Err(SeedFileError::NotAnArray),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            parse_new_product(entry).map_err(|error| SeedFileError::InvalidProduct { index, error })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[tokio::test]
    async fn test_seed_empty_store_yields_exact_set() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        let inserted = seed_if_empty(&storage).await.unwrap();
        assert_eq!(inserted, 5);

        let listed = storage.list_products().await.unwrap();
        let listed: Vec<NewProduct> = listed
            .into_iter()
            .map(|p| NewProduct {
                name: p.name,
                description: p.description,
                price: p.price,
                category: p.category,
                image_url: p.image_url,
            })
            .collect();
        assert_eq!(listed, default_products());
    }

    #[tokio::test]
    async fn test_seed_is_skipped_when_catalog_has_entries() {
        let storage = SqliteStorage::open_in_memory().unwrap();

        assert_eq!(seed_if_empty(&storage).await.unwrap(), 5);
        assert_eq!(seed_if_empty(&storage).await.unwrap(), 0);
        assert_eq!(storage.list_products().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_seed_custom_products() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut products = default_products();
        products.truncate(2);

        assert_eq!(seed_products_if_empty(&storage, products).await.unwrap(), 2);
        let names: Vec<String> = storage
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Computer Repair & Diagnostics", "Custom Website Development"]);
    }

    #[test]
    fn test_parse_seed_file() {
        let products = parse_seed_file(
            r#"[{
                "name": "Laptop Screen Replacement",
                "description": "Cracked screens swapped same day",
                "price": "From $120",
                "category": "hardware",
                "imageUrl": "https://example.com/screen.jpg"
            }]"#,
        )
        .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].category, ProductCategory::Hardware);
    }

    #[test]
    fn test_parse_seed_file_reports_bad_entry() {
        let err = parse_seed_file(
            r#"[
                {"name": "A", "description": "B", "price": "$1", "category": "saas", "imageUrl": "https://x"},
                {"name": "C", "description": "D", "price": "$2", "category": "gadgets", "imageUrl": "https://y"}
            ]"#,
        )
        .unwrap_err();

        match err {
            SeedFileError::InvalidProduct { index, error } => {
                assert_eq!(index, 1);
                assert_eq!(error.field, "category");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_seed_file_requires_array() {
        assert!(matches!(parse_seed_file(r#"{"name": "A"}"#), Err(SeedFileError::NotAnArray)));
        assert!(matches!(parse_seed_file("not json"), Err(SeedFileError::Json(_))));
    }
}
