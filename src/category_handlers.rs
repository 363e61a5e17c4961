// src/category_handlers.rs
//! Category CRUD

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use validator::Validate;
use log::info;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{parse_id, ApiResponse};
use crate::models::{CreateCategoryRequest, UpdateCategoryRequest};
use crate::repositories::{CategoryRepository, CrudRepository};

fn path_id(raw: &str) -> ApiResult<String> {
    parse_id(raw).ok_or_else(|| ApiError::invalid_id("Category"))
}

pub async fn create_category(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateCategoryRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let category = CategoryRepository::new().create(&app_state.db_pool, request).await?;
    info!("Category created: {} ({})", category.name, category.id);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(category, "Category Created")))
}

pub async fn get_categories(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let categories = CategoryRepository::new().list(&app_state.db_pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(categories, "Category data")))
}

pub async fn get_category(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path_id(&path)?;
    let category = CategoryRepository::new().require(&app_state.db_pool, &id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(category)))
}

pub async fn update_category(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateCategoryRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path).ok_or_else(ApiError::check_your_id)?;
    let request = body.into_inner();
    request.validate()?;

    let category = CategoryRepository::new().update(&app_state.db_pool, &id, request).await?;
    info!("Category updated: {}", category.id);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(category, "Updated Successfully")))
}

pub async fn delete_category(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path_id(&path)?;
    let repo = CategoryRepository::new();
    let category = repo.require(&app_state.db_pool, &id).await?;

    let references = repo.references(&app_state.db_pool, &id).await?;
    if !references.is_empty() {
        return Err(ApiError::still_referenced("Category", &references.join(", ")));
    }

    repo.delete(&app_state.db_pool, &id).await?;
    info!("Category deleted: {} ({})", category.name, category.id);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(category, "Delete successfully")))
}
