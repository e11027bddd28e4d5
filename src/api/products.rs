//! Catalog endpoints
//!
//! - GET /api/products - Every product, in id order
//! - GET /api/products/:id - One product, or 404

use crate::api::AppState;
use crate::error::{ApiError, Result};
use crate::model::Product;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.storage.list_products().await?;
    debug!("Listing {} products", products.len());
    Ok(Json(products))
}

/// Ids that are not integers cannot match a row, so they are reported as missing
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let product = match id.parse::<i32>() {
        Ok(numeric_id) => state.storage.get_product(numeric_id).await?,
        Err(_) => None,
    };

    product.map(Json).ok_or(ApiError::ProductNotFound { id })
}
