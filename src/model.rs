//! Catalog and inquiry records
//!
//! Wire format is camelCase JSON, matching what the storefront client reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog section a product is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Saas,
    Hardware,
    Software,
    Service,
    Maintenance,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 5] = [
        ProductCategory::Saas,
        ProductCategory::Hardware,
        ProductCategory::Software,
        ProductCategory::Service,
        ProductCategory::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Saas => "saas",
            ProductCategory::Hardware => "hardware",
            ProductCategory::Software => "software",
            ProductCategory::Service => "service",
            ProductCategory::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown product category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for ProductCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: String,
    /// Display string, e.g. "Starts at $50" or "$29/month"
    pub price: String,
    pub category: ProductCategory,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Product fields supplied by the caller; id and timestamp are assigned on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: ProductCategory,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub message: String,
    pub service_of_interest: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInquiry {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub service_of_interest: Option<String>,
}
