// src/camera_part_handlers.rs
//! Camera parts (sub-categories). Update and delete take `_id` in the body.

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use log::info;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{non_empty, parse_id, require_id, ApiResponse};
use crate::models::{CameraPartQuery, CreateCameraPartRequest, IdBody, UpdateCameraPartRequest};
use crate::repositories::{missing_ids, CameraPartRepository, CrudRepository, NewCameraPart};

const REQUIRED_FIELDS: &str = "Provide name, code, image, and at least one category.";

/// Parses category ids and checks that every one of them exists.
async fn checked_categories(pool: &sqlx::SqlitePool, raw: &[String]) -> ApiResult<Vec<String>> {
    let ids = raw
        .iter()
        .map(|id| require_id(Some(id.as_str()), "Category"))
        .collect::<ApiResult<Vec<_>>>()?;

    let missing = missing_ids(pool, "categories", &ids).await?;
    if let Some(id) = missing.first() {
        return Err(ApiError::NotFound(format!("Category {} not found", id)));
    }
    Ok(ids)
}

pub async fn create_camera_part(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateCameraPartRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();

    let (name, code, image) = match (
        non_empty(request.name.as_deref()),
        non_empty(request.code.as_deref()),
        non_empty(request.image.as_deref()),
    ) {
        (Some(name), Some(code), Some(image)) if !request.category.is_empty() => (name, code, image),
        _ => return Err(ApiError::bad_request(REQUIRED_FIELDS)),
    };
    request.validate()?;

    let pool = &app_state.db_pool;
    let categories = checked_categories(pool, &request.category).await?;

    let repo = CameraPartRepository::new();
    let row = repo
        .create(pool, NewCameraPart {
            name,
            code,
            image,
            categories,
            parts_per_camera: request.parts_per_camera.unwrap_or(1),
        })
        .await?;
    let part = repo.populate(pool, row).await?;

    info!("Camera part created: {} [{}]", part.name, part.code);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(part, "Sub Category Created")))
}

pub async fn get_camera_parts(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<CameraPartQuery>,
) -> ApiResult<HttpResponse> {
    let category = match non_empty(query.category.as_deref()) {
        Some(raw) => Some(require_id(Some(&raw), "Category")?),
        None => None,
    };

    let parts = CameraPartRepository::new()
        .list_populated(&app_state.db_pool, category.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(parts, "Sub Category data")))
}

pub async fn get_camera_part(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path).ok_or_else(|| ApiError::invalid_id("Camera part"))?;
    let repo = CameraPartRepository::new();
    let row = repo.require(&app_state.db_pool, &id).await?;
    let part = repo.populate(&app_state.db_pool, row).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(part)))
}

pub async fn update_camera_part(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<UpdateCameraPartRequest>,
) -> ApiResult<HttpResponse> {
    let mut request = body.into_inner();
    let id = request
        .id
        .as_deref()
        .and_then(parse_id)
        .ok_or_else(ApiError::check_your_id)?;
    request.validate()?;

    let pool = &app_state.db_pool;
    if let Some(raw) = request.category.take() {
        if raw.is_empty() {
            return Err(ApiError::bad_request("At least one category is required"));
        }
        request.category = Some(checked_categories(pool, &raw).await?);
    }

    let repo = CameraPartRepository::new();
    let row = repo.update(pool, &id, request).await?;
    let part = repo.populate(pool, row).await?;

    info!("Camera part updated: {}", part.id);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(part, "Updated Successfully")))
}

pub async fn delete_camera_part(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<IdBody>,
) -> ApiResult<HttpResponse> {
    let id = body
        .id
        .as_deref()
        .and_then(parse_id)
        .ok_or_else(ApiError::check_your_id)?;

    let pool = &app_state.db_pool;
    let repo = CameraPartRepository::new();
    let row = repo.get_by_id(pool, &id).await?.ok_or_else(ApiError::check_your_id)?;

    if repo.is_referenced(pool, &id).await? {
        return Err(ApiError::still_referenced("Camera part", "products or stock records"));
    }

    let part = repo.populate(pool, row).await?;
    repo.delete(pool, &id).await?;

    info!("Camera part deleted: {} [{}]", part.name, part.code);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(part, "Delete successfully")))
}
