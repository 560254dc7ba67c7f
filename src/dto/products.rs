use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Minor currency units.
    pub price: i64,
    pub stock: i32,
    pub category: String,
    /// Defaults to the caller. Only admins may list on behalf of another vendor.
    pub vendor_id: Option<Uuid>,
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub vendor_name: Option<String>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockOperation {
    #[default]
    Set,
    Increment,
    Decrement,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockUpdateRequest {
    pub quantity: i32,
    #[serde(default)]
    pub operation: StockOperation,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
