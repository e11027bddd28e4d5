//! Product list filtering as done by the storefront's catalog page
//!
//! The API always returns the whole catalog; narrowing it down by category
//! and search text happens on the client.

use crate::model::{Product, ProductCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(ProductCategory),
}

impl CategoryFilter {
    /// "all" or a category wire name
    pub fn parse(value: &str) -> Option<Self> {
        if value == "all" {
            return Some(CategoryFilter::All);
        }
        value.parse().ok().map(CategoryFilter::Only)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: CategoryFilter,
    pub search: String,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let category_matches = match self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => product.category == category,
        };

        let needle = self.search.to_lowercase();
        let search_matches = product.name.to_lowercase().contains(&needle)
            || product.description.to_lowercase().contains(&needle);

        category_matches && search_matches
    }
}

pub fn filter_products<'a>(products: &'a [Product], filter: &ProductFilter) -> Vec<&'a Product> {
    products.iter().filter(|p| filter.matches(p)).collect()
}
