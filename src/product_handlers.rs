// src/product_handlers.rs
//! Products and their boxes

use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::SqliteConnection;
use std::sync::Arc;
use validator::Validate;
use log::info;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{new_id, parse_id, require_id, ApiResponse};
use crate::inventory;
use crate::models::*;
use crate::repositories::missing_ids;
use crate::validator::FieldValidator;

// ==================== INPUT CHECKS ====================

async fn checked_refs(
    pool: &sqlx::SqlitePool,
    raw: &[String],
    table: &str,
    label: &str,
) -> ApiResult<Vec<String>> {
    let mut ids: Vec<String> = Vec::with_capacity(raw.len());
    for value in raw {
        let id = require_id(Some(value.as_str()), label)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if let Some(id) = missing_ids(pool, table, &ids).await?.first() {
        return Err(ApiError::NotFound(format!("{} {} not found", label, id)));
    }
    Ok(ids)
}

/// Trimmed boxes; a `boxNo` may appear only once per product.
fn checked_boxes(boxes: &[BoxInput]) -> ApiResult<Vec<BoxInput>> {
    let mut out: Vec<BoxInput> = Vec::with_capacity(boxes.len());
    for b in boxes {
        b.validate()?;
        let box_no = FieldValidator::box_no(&b.box_no)?;
        if out.iter().any(|o| o.box_no == box_no) {
            return Err(ApiError::BadRequest(format!("Duplicate box number \"{}\"", box_no)));
        }
        out.push(BoxInput { box_no, parts_qty: b.parts_qty });
    }
    Ok(out)
}

fn checked_details(value: Option<serde_json::Value>) -> ApiResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_object() => Ok(Some(v.to_string())),
        Some(_) => Err(ApiError::bad_request("more_details must be an object")),
    }
}

async fn link_refs(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    product_id: &str,
    ids: &[String],
) -> ApiResult<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE product_id = ?", table))
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let insert = format!(
        "INSERT INTO {} (product_id, {}, position) VALUES (?, ?, ?)",
        table, column
    );
    for (position, id) in ids.iter().enumerate() {
        sqlx::query(&insert)
            .bind(product_id)
            .bind(id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Replaces the box list. Boxes keeping their number keep their `_id`, so
/// withdrawal history still points at them.
async fn replace_boxes(conn: &mut SqliteConnection, product_id: &str, boxes: &[BoxInput]) -> ApiResult<()> {
    let existing = inventory::product_boxes(conn, product_id).await?;

    for old in &existing {
        if !boxes.iter().any(|b| b.box_no == old.box_no) {
            sqlx::query("DELETE FROM product_boxes WHERE id = ?")
                .bind(&old.id)
                .execute(&mut *conn)
                .await?;
        }
    }

    for (position, b) in boxes.iter().enumerate() {
        match existing.iter().find(|old| old.box_no == b.box_no) {
            Some(old) => {
                sqlx::query("UPDATE product_boxes SET parts_qty = ?, position = ? WHERE id = ?")
                    .bind(b.parts_qty)
                    .bind(position as i64)
                    .bind(&old.id)
                    .execute(&mut *conn)
                    .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO product_boxes (id, product_id, box_no, parts_qty, position) VALUES (?, ?, ?, ?, ?)",
                )
                    .bind(new_id())
                    .bind(product_id)
                    .bind(&b.box_no)
                    .bind(b.parts_qty)
                    .bind(position as i64)
                    .execute(&mut *conn)
                    .await?;
            }
        }
    }
    Ok(())
}

fn path_id(raw: &str) -> ApiResult<String> {
    parse_id(raw).ok_or_else(|| ApiError::invalid_id("Product"))
}

// ==================== HANDLERS ====================

pub async fn create_product(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateProductRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    if request.category.is_empty() || request.sub_category.is_empty() {
        return Err(ApiError::bad_request("Provide at least one category and sub category."));
    }

    let pool = &app_state.db_pool;
    let categories = checked_refs(pool, &request.category, "categories", "Category").await?;
    let sub_categories = checked_refs(pool, &request.sub_category, "sub_categories", "SubCategory").await?;
    let boxes = checked_boxes(&request.boxes)?;
    let more_details = checked_details(request.more_details)?.unwrap_or_else(|| "{}".to_string());

    let id = new_id();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO products (id, description, more_details, publish, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
        .bind(&id)
        .bind(request.description.as_deref().unwrap_or(""))
        .bind(&more_details)
        .bind(request.publish.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    link_refs(&mut tx, "product_categories", "category_id", &id, &categories).await?;
    link_refs(&mut tx, "product_sub_categories", "sub_category_id", &id, &sub_categories).await?;
    replace_boxes(&mut tx, &id, &boxes).await?;

    let product = inventory::fetch_product(&mut tx, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;
    tx.commit().await?;

    info!("Product created: {} with {} boxes", product.id, product.boxes.len());
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(product, "Product Created")))
}

pub async fn get_products(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let mut conn = app_state.db_pool.acquire().await?;

    let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products ORDER BY created_at DESC, rowid DESC")
        .fetch_all(&mut *conn)
        .await?;

    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        products.push(inventory::load_product(&mut conn, row).await?);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(products, "Product data")))
}

pub async fn get_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path_id(&path)?;
    let mut conn = app_state.db_pool.acquire().await?;
    let product = inventory::fetch_product(&mut conn, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}

/// Products of a category / sub-category pair plus their merged boxes
pub async fn get_products_by_category_and_sub_category(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<ProductLookupRequest>,
) -> ApiResult<HttpResponse> {
    let category_id = require_id(body.category_id.as_deref(), "Category")?;
    let sub_category_id = require_id(body.sub_category_id.as_deref(), "SubCategory")?;

    let mut conn = app_state.db_pool.acquire().await?;
    let products = inventory::products_for(&mut conn, &category_id, &sub_category_id).await?;
    let combined_boxes = inventory::combine_boxes(products.iter().flat_map(|p| p.boxes.iter()));

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        ProductLookupResponse { products, combined_boxes },
        "Product data",
    )))
}

pub async fn update_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateProductRequest>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&path).ok_or_else(ApiError::check_your_id)?;
    let request = body.into_inner();
    request.validate()?;

    let pool = &app_state.db_pool;
    let existing: ProductRow = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(&id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(ApiError::check_your_id)?;

    let categories = match request.category.as_deref() {
        Some([]) => return Err(ApiError::bad_request("At least one category is required")),
        Some(raw) => Some(checked_refs(pool, raw, "categories", "Category").await?),
        None => None,
    };
    let sub_categories = match request.sub_category.as_deref() {
        Some([]) => return Err(ApiError::bad_request("At least one sub category is required")),
        Some(raw) => Some(checked_refs(pool, raw, "sub_categories", "SubCategory").await?),
        None => None,
    };
    let boxes = request.boxes.as_deref().map(checked_boxes).transpose()?;
    let more_details = checked_details(request.more_details)?.unwrap_or(existing.more_details);

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE products SET description = ?, more_details = ?, publish = ?, updated_at = ? WHERE id = ?",
    )
        .bind(request.description.unwrap_or(existing.description))
        .bind(&more_details)
        .bind(request.publish.unwrap_or(existing.publish))
        .bind(Utc::now())
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    if let Some(categories) = &categories {
        link_refs(&mut tx, "product_categories", "category_id", &id, categories).await?;
    }
    if let Some(sub_categories) = &sub_categories {
        link_refs(&mut tx, "product_sub_categories", "sub_category_id", &id, sub_categories).await?;
    }
    if let Some(boxes) = &boxes {
        replace_boxes(&mut tx, &id, boxes).await?;
    }

    let product = inventory::fetch_product(&mut tx, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;
    tx.commit().await?;

    info!("Product updated: {}", product.id);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(product, "Updated Successfully")))
}

pub async fn delete_product(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path_id(&path)?;
    let pool = &app_state.db_pool;

    let withdrawals: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM out_products o
           JOIN product_boxes b ON b.id = o.box_id
           WHERE b.product_id = ?"#,
    )
        .bind(&id)
        .fetch_one(pool)
        .await?;
    if withdrawals > 0 {
        return Err(ApiError::still_referenced("Product", "out product records"));
    }

    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product"));
    }

    info!("Product deleted: {}", id);
    Ok(HttpResponse::Ok().json(ApiResponse::message_only("Delete successfully")))
}
