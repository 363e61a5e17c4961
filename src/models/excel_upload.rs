// src/models/excel_upload.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
pub enum UploadStatus {
    Pending,
    Applied,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExcelUpload {
    #[serde(rename = "_id")]
    pub id: String,
    pub parts_name: String,
    pub parts_code: String,
    pub box_no: String,
    pub qty: i64,
    pub category_id: String,
    pub sub_category_id: String,
    pub status: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImportUploadRow {
    #[validate(length(min = 1, max = 255, message = "Parts name is required"))]
    pub parts_name: String,
    #[validate(length(min = 1, max = 100, message = "Parts code is required"))]
    pub parts_code: String,
    #[validate(length(min = 1, max = 100, message = "Box number is required"))]
    pub box_no: String,
    #[validate(range(min = 1, max = 1_000_000_000, message = "Quantity must be between 1 and 1000000000"))]
    pub qty: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImportUploadsRequest {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    #[serde(default)]
    pub rows: Vec<ImportUploadRow>,
}

/// Target category / sub-category for a multipart spreadsheet upload
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetQuery {
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UploadListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
pub struct RejectUploadRequest {
    #[validate(length(max = 1000, message = "Remark cannot exceed 1000 characters"))]
    pub remark: Option<String>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub total: usize,
    pub errors: Vec<String>,
}
