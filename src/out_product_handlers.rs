// src/out_product_handlers.rs
//! Withdrawals of parts from a box

use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use log::{info, warn};
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{new_id, non_empty, require_id, ApiResponse, PaginatedResponse};
use crate::inventory;
use crate::models::*;
use crate::pagination::{bind_query_as, bind_scalar, day_range, FilterBuilder, Page};
use crate::validator::MAX_QTY;

const RECORD_SELECT: &str = r#"
    SELECT o.id, o.category_id, c.name AS category_name,
           o.sub_category_id, s.name AS sub_category_name, s.code AS sub_category_code,
           o.box_id, COALESCE(b.box_no, '') AS box_no,
           o.quantity, o.created_at, o.updated_at
    FROM out_products o
    JOIN categories c ON c.id = o.category_id
    JOIN sub_categories s ON s.id = o.sub_category_id
    LEFT JOIN product_boxes b ON b.id = o.box_id"#;

const RECORD_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM out_products o
    JOIN categories c ON c.id = o.category_id
    JOIN sub_categories s ON s.id = o.sub_category_id
    LEFT JOIN product_boxes b ON b.id = o.box_id"#;

fn history_filters(query: &OutProductQuery) -> ApiResult<FilterBuilder> {
    let mut filters = FilterBuilder::new();

    if let Some(date) = non_empty(query.date.as_deref()) {
        filters.add_time_range("o.created_at", day_range(&date)?);
    }
    if let Some(category) = non_empty(query.category.as_deref()) {
        filters.add_exact("c.name", &category);
    }
    if let Some(sub_category) = non_empty(query.sub_category.as_deref()) {
        filters.add_exact("s.name", &sub_category);
    }
    if let Some(box_no) = non_empty(query.box_no.as_deref()) {
        filters.add_contains("b.box_no", &box_no);
    }

    Ok(filters)
}

/// Filtered withdrawals, newest first. All of them when `page` is `None`.
pub async fn fetch_history(
    pool: &SqlitePool,
    query: &OutProductQuery,
    page: Option<Page>,
) -> ApiResult<(Vec<OutProductRecord>, i64)> {
    let filters = history_filters(query)?;
    let where_clause = filters.where_clause();

    let count_sql = format!("{}{}", RECORD_COUNT, where_clause);
    let total: i64 = bind_scalar(sqlx::query_scalar(&count_sql), filters.params())
        .fetch_one(pool)
        .await?;

    let mut sql = format!("{}{} ORDER BY o.created_at DESC, o.rowid DESC", RECORD_SELECT, where_clause);
    if let Some(page) = page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
    }

    let records = bind_query_as(sqlx::query_as::<_, OutProductRecord>(&sql), filters.params())
        .fetch_all(pool)
        .await?;

    Ok((records, total))
}

pub async fn create_out_product(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateOutProductRequest>,
) -> ApiResult<HttpResponse> {
    let category_id = require_id(body.category.as_deref(), "Category")?;
    let sub_category_id = require_id(body.sub_category.as_deref(), "SubCategory")?;
    let box_id = require_id(body.box_id.as_deref(), "Box")?;
    let quantity = match body.quantity {
        Some(q) if (1..=MAX_QTY).contains(&q) => q,
        _ => return Err(ApiError::BadRequest(format!("Quantity must be between 1 and {}", MAX_QTY))),
    };

    let owned: Option<String> = sqlx::query_scalar(
        r#"SELECT b.id FROM product_boxes b
           WHERE b.id = ?
             AND EXISTS (SELECT 1 FROM product_categories pc
                         WHERE pc.product_id = b.product_id AND pc.category_id = ?)
             AND EXISTS (SELECT 1 FROM product_sub_categories ps
                         WHERE ps.product_id = b.product_id AND ps.sub_category_id = ?)"#,
    )
        .bind(&box_id)
        .bind(&category_id)
        .bind(&sub_category_id)
        .fetch_optional(&app_state.db_pool)
        .await?;
    if owned.is_none() {
        return Err(ApiError::NotFound("Box not found for the selected category and sub category".to_string()));
    }

    // The decrement must be the first statement of the transaction
    let mut tx = app_state.db_pool.begin().await?;
    if !inventory::take_from_box(&mut tx, &box_id, quantity).await? {
        let available = sqlx::query_scalar::<_, i64>("SELECT parts_qty FROM product_boxes WHERE id = ?")
            .bind(&box_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0);
        warn!("Out product refused for box {}: {} requested, {} available", box_id, quantity, available);
        return Err(ApiError::insufficient_quantity(available, quantity));
    }

    let id = new_id();
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO out_products (id, category_id, sub_category_id, box_id, quantity, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
        .bind(&id)
        .bind(&category_id)
        .bind(&sub_category_id)
        .bind(&box_id)
        .bind(quantity)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let record: OutProductRecord = sqlx::query_as(&format!("{} WHERE o.id = ?", RECORD_SELECT))
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("Out product: {} parts from box {} ({})", quantity, record.box_no, record.sub_category_name);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(record, "Out product recorded successfully")))
}

pub async fn get_out_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<OutProductQuery>,
) -> ApiResult<HttpResponse> {
    let inventory = &app_state.config.inventory;
    let page = Page::normalize(query.page, query.limit, inventory.default_page_size, inventory.max_page_size);

    let (items, total_count) = fetch_history(&app_state.db_pool, &query, Some(page)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse {
        items,
        total_count,
        current_page: page.page,
        limit: page.limit,
        total_pages: page.total_pages(total_count),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use crate::db::{fixtures, test_pool};

    #[actix_rt::test]
    async fn test_withdrawal_decrements_box() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 10)]).await;
        let box_id = fixtures::box_id(&pool, &product, "B1").await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/out-products")
            .set_json(json!({ "category": cat, "subCategory": sub, "box": box_id, "quantity": 4 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["boxNo"], "B1");
        assert_eq!(body["data"]["subCategoryName"], "Lens");

        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(6));
    }

    #[actix_rt::test]
    async fn test_insufficient_quantity_leaves_stock_untouched() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 3)]).await;
        let box_id = fixtures::box_id(&pool, &product, "B1").await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/out-products")
            .set_json(json!({ "category": cat, "subCategory": sub, "box": box_id, "quantity": 5 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Insufficient quantity. Available: 3, Requested: 5");

        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(3));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM out_products")
            .fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[actix_rt::test]
    async fn test_invalid_ids_and_foreign_box() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let other = fixtures::category(&pool, "Bullet").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat, &other]).await;
        let product = fixtures::product(&pool, &other, &sub, &[("B1", 3)]).await;
        let box_id = fixtures::box_id(&pool, &product, "B1").await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/out-products")
            .set_json(json!({ "category": "nope", "subCategory": sub, "box": box_id, "quantity": 1 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/out-products")
            .set_json(json!({ "category": cat, "subCategory": sub, "box": box_id, "quantity": 0 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/out-products")
            .set_json(json!({ "category": cat, "subCategory": sub, "box": box_id, "quantity": 1 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_history_filters_and_pagination() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let lens = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let board = fixtures::sub_category(&pool, "Board", &[&cat]).await;
        let p1 = fixtures::product(&pool, &cat, &lens, &[("A-100", 50)]).await;
        let p2 = fixtures::product(&pool, &cat, &board, &[("Z-200", 50)]).await;
        let b1 = fixtures::box_id(&pool, &p1, "A-100").await;
        let b2 = fixtures::box_id(&pool, &p2, "Z-200").await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        for (sub, b) in [(&lens, &b1), (&lens, &b1), (&board, &b2)] {
            let req = test::TestRequest::post()
                .uri("/api/v1/out-products")
                .set_json(json!({ "category": cat, "subCategory": sub, "box": b, "quantity": 1 }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/api/v1/out-products?subCategory=Lens").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["totalCount"], 2);

        let req = test::TestRequest::get().uri("/api/v1/out-products?box=z-2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["totalCount"], 1);
        assert_eq!(body["data"]["items"][0]["boxNo"], "Z-200");

        let req = test::TestRequest::get().uri("/api/v1/out-products?page=2&limit=2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["totalPages"], 2);

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/out-products?date={}", today))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["totalCount"], 3);

        let req = test::TestRequest::get().uri("/api/v1/out-products?date=2001-01-01").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["totalCount"], 0);
    }

    #[actix_rt::test]
    async fn test_quantity_above_cap_is_rejected() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 3)]).await;
        let box_id = fixtures::box_id(&pool, &product, "B1").await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/out-products")
            .set_json(json!({ "category": cat, "subCategory": sub, "box": box_id, "quantity": i64::MAX }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Quantity must be between 1 and 1000000000");
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(3));
    }

    #[actix_rt::test]
    async fn test_concurrent_withdrawals_cannot_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::file_pool(dir.path(), 4).await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 5)]).await;
        let box_id = fixtures::box_id(&pool, &product, "B1").await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let withdraw = || {
            test::TestRequest::post()
                .uri("/api/v1/out-products")
                .set_json(json!({ "category": cat, "subCategory": sub, "box": box_id, "quantity": 3 }))
                .to_request()
        };
        let (first, second) = futures_util::join!(
            test::call_service(&app, withdraw()),
            test::call_service(&app, withdraw())
        );

        let mut statuses = vec![first.status(), second.status()];
        statuses.sort_by_key(|s| s.as_u16());
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::BAD_REQUEST]);
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(2));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM out_products")
            .fetch_one(&pool).await.unwrap();
        assert_eq!(count, 1);
    }

    #[actix_rt::test]
    async fn test_fetch_history_unpaged() {
        let pool = test_pool().await;
        let (records, total) = fetch_history(&pool, &OutProductQuery::default(), None).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }
}
