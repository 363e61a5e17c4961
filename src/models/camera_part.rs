// src/models/camera_part.rs
//! Sub-categories of camera parts (the admin screens call them "camera parts").

use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};
use super::NamedRef;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct SubCategoryRow {
    pub id: String,
    pub name: String,
    pub code: String,
    pub image: String,
    pub parts_per_camera: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sub-category with its categories populated
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CameraPart {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub code: String,
    pub image: String,
    pub category: Vec<NamedRef>,
    pub parts_per_camera: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CameraPart {
    pub fn from_row(row: SubCategoryRow, category: Vec<NamedRef>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            image: row.image,
            category,
            parts_per_camera: row.parts_per_camera,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Required fields are optional here so a missing one yields the
/// "Provide name, code, image..." message instead of a parse error.
#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateCameraPartRequest {
    #[validate(length(max = 255, message = "Name cannot exceed 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 100, message = "Code cannot exceed 100 characters"))]
    pub code: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[validate(range(min = 1, message = "Parts per camera must be at least 1"))]
    pub parts_per_camera: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCameraPartRequest {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Code must be between 1 and 100 characters"))]
    pub code: Option<String>,
    #[validate(length(min = 1, message = "Image cannot be empty"))]
    pub image: Option<String>,
    pub category: Option<Vec<String>>,
    #[validate(range(min = 1, message = "Parts per camera must be at least 1"))]
    pub parts_per_camera: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdBody {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraPartQuery {
    pub category: Option<String>,
}
