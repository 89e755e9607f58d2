use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, ProductImage};

/// Body for product create and update. The `category_id` is validated against
/// the categories table; the human-readable category name is always re-derived
/// from it server-side.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductPayload {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: i32,
    pub category_id: i32,
    pub color: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductImageList {
    pub images: Vec<ProductImage>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageUploadResponse {
    pub image_urls: Vec<String>,
}
