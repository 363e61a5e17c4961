// src/models/ready_camera.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use super::NamedRef;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ReadyCameraRow {
    pub id: String,
    pub category_id: String,
    pub category_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadyCameraBox {
    #[serde(rename = "_id")]
    pub id: String,
    pub box_no: String,
    #[serde(rename = "partUIDs")]
    pub part_uids: Vec<String>,
    pub total_parts: usize,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReadyCamera {
    #[serde(rename = "_id")]
    pub id: String,
    pub category: NamedRef,
    pub boxes: Vec<ReadyCameraBox>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReadyCameraBoxInput {
    #[serde(default)]
    pub box_no: String,
    #[serde(default, rename = "partUIDs", alias = "partUids")]
    pub part_uids: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadyCameraRequest {
    pub category: Option<String>,
    #[serde(default)]
    pub boxes: Vec<ReadyCameraBoxInput>,
    pub description: Option<String>,
}

/// History filters: `category` by name, `uid` as a case-insensitive substring.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReadyCameraQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub uid: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UidLocation {
    pub uid: String,
    pub ready_camera_id: String,
    pub box_id: String,
    pub box_no: String,
    pub category_name: String,
}
