// src/models/damage_product.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

/// Direction of a damage ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
pub enum DamageAction {
    Add,
    Out,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DamageProductRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub category_id: String,
    pub category_name: Option<String>,
    pub sub_category_id: String,
    pub sub_category_name: Option<String>,
    pub box_no: String,
    pub quantity: i64,
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `partsQty` is kept loose: non-numeric values make the box invalid
/// (skipped) instead of failing the whole request.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DamageBoxInput {
    #[serde(default)]
    pub box_no: Option<String>,
    #[serde(default)]
    pub parts_qty: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DamageRequest {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub boxes: Option<Vec<DamageBoxInput>>,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DamageListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedBox {
    pub box_no: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DamageOutcome {
    pub processed: usize,
    pub skipped: Vec<SkippedBox>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageListResponse {
    pub success: bool,
    pub data: Vec<DamageProductRecord>,
    pub total_count: i64,
    pub current_page: i64,
    pub total_pages: i64,
}
