// src/handlers.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::inventory;
use crate::models::{DashboardStats, StockQuery};

// ==================== COMMON STRUCTURES ====================

/// `{ success, message, data?, error? }` envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            error: false,
            message: String::new(),
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub current_page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

// ==================== IDENTIFIERS ====================

/// Normalised UUID, or `None` when the value is not a valid identifier.
pub fn parse_id(value: &str) -> Option<String> {
    Uuid::parse_str(value.trim()).ok().map(|id| id.to_string())
}

/// Required identifier from a request body; missing or malformed is a 400.
pub fn require_id(value: Option<&str>, field: &str) -> ApiResult<String> {
    value
        .and_then(parse_id)
        .ok_or_else(|| ApiError::invalid_id(field))
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trimmed, non-empty string or `None`
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ==================== DASHBOARD ====================

pub async fn get_dashboard_stats(
    app_state: web::Data<Arc<AppState>>,
) -> ApiResult<HttpResponse> {
    let pool = &app_state.db_pool;

    let count = |sql: &'static str| async move {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
    };

    let stats = DashboardStats {
        total_categories: count("SELECT COUNT(*) FROM categories").await?,
        total_sub_categories: count("SELECT COUNT(*) FROM sub_categories").await?,
        total_products: count("SELECT COUNT(*) FROM products").await?,
        total_boxes: count("SELECT COUNT(*) FROM product_boxes").await?,
        total_parts_qty: count("SELECT COALESCE(SUM(parts_qty), 0) FROM product_boxes").await?,
        total_ready_cameras: count("SELECT COUNT(*) FROM ready_cameras").await?,
        total_part_uids: count("SELECT COUNT(*) FROM ready_camera_part_uids").await?,
        total_out_records: count("SELECT COUNT(*) FROM out_products").await?,
        total_damage_entries: count("SELECT COUNT(*) FROM damage_products").await?,
        pending_uploads: count("SELECT COUNT(*) FROM excel_uploads WHERE status = 'Pending'").await?,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

pub async fn get_stock_summary(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<StockQuery>,
) -> ApiResult<HttpResponse> {
    let category = match non_empty(query.category.as_deref()) {
        Some(raw) => Some(require_id(Some(&raw), "Category")?),
        None => None,
    };

    let summary = inventory::stock_summary(&app_state.db_pool, category.as_deref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}
