// src/models/out_product.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Withdrawal with category, sub-category and box populated
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OutProductRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub category_id: String,
    pub category_name: String,
    pub sub_category_id: String,
    pub sub_category_name: String,
    pub sub_category_code: String,
    pub box_id: String,
    pub box_no: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutProductRequest {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    #[serde(rename = "box")]
    pub box_id: Option<String>,
    pub quantity: Option<i64>,
}

/// History filters. `category` and `subCategory` match by name, `box` is a
/// substring of the box number, `date` is a whole UTC day.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    #[serde(rename = "box")]
    pub box_no: Option<String>,
}
