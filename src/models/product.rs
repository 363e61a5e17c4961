// src/models/product.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};
use super::NamedRef;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ProductRow {
    pub id: String,
    pub description: String,
    pub more_details: String,
    pub publish: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A physical container of parts inside a product
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductBox {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing)]
    pub product_id: String,
    pub box_no: String,
    pub parts_qty: i64,
    #[serde(skip_serializing)]
    pub position: i64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub category: Vec<NamedRef>,
    pub sub_category: Vec<NamedRef>,
    pub boxes: Vec<ProductBox>,
    pub description: String,
    #[serde(rename = "more_details")]
    pub more_details: serde_json::Value,
    pub publish: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BoxInput {
    #[validate(length(min = 1, max = 100, message = "Box number must be between 1 and 100 characters"))]
    pub box_no: String,
    #[validate(range(min = 0, max = 1_000_000_000, message = "Parts quantity must be between 0 and 1000000000"))]
    pub parts_qty: i64,
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub sub_category: Vec<String>,
    #[serde(default)]
    pub boxes: Vec<BoxInput>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
    #[serde(rename = "more_details")]
    pub more_details: Option<serde_json::Value>,
    pub publish: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub category: Option<Vec<String>>,
    pub sub_category: Option<Vec<String>>,
    pub boxes: Option<Vec<BoxInput>>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
    #[serde(rename = "more_details")]
    pub more_details: Option<serde_json::Value>,
    pub publish: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProductLookupRequest {
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
}

/// Same-numbered boxes merged across product records
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CombinedBox {
    #[serde(rename = "_id")]
    pub id: String,
    pub box_no: String,
    pub parts_qty: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLookupResponse {
    pub products: Vec<Product>,
    pub combined_boxes: Vec<CombinedBox>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetailedBox {
    pub box_no: String,
    pub parts_qty: i64,
    pub action: String,
    pub date_added: DateTime<Utc>,
}

/// Per sub-category stock, as shown on the admin dashboard
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryStock {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub code: String,
    pub image: String,
    pub total_boxes: i64,
    pub total_parts_qty: i64,
    pub detailed_boxes: Vec<DetailedBox>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StockQuery {
    pub category: Option<String>,
}
