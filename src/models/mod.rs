// src/models/mod.rs

pub mod camera_part;
pub mod category;
pub mod damage_product;
pub mod excel_upload;
pub mod out_product;
pub mod product;
pub mod ready_camera;

// Re-export so structs are reachable as crate::models::StructName
pub use camera_part::*;
pub use category::*;
pub use damage_product::*;
pub use excel_upload::*;
pub use out_product::*;
pub use product::*;
pub use ready_camera::*;

use serde::{Deserialize, Serialize};

// ==================== COMMON / SHARED ====================

/// A populated reference: `{ "_id": ..., "name": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NamedRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// Counters for the admin dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_categories: i64,
    pub total_sub_categories: i64,
    pub total_products: i64,
    pub total_boxes: i64,
    pub total_parts_qty: i64,
    pub total_ready_cameras: i64,
    pub total_part_uids: i64,
    pub total_out_records: i64,
    pub total_damage_entries: i64,
    pub pending_uploads: i64,
}
