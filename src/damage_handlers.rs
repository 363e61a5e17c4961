// src/damage_handlers.rs
//! Damaged-goods ledger. Entries for regular boxes also move product stock;
//! boxes carrying the damaged prefix live in the ledger only.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use log::{info, warn};
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{new_id, non_empty, parse_id, ApiResponse};
use crate::inventory;
use crate::models::*;
use crate::repositories::missing_ids;
use crate::pagination::{bind_query_as, bind_scalar, inclusive_range, FilterBuilder, Page, TimeRange};
use crate::validator::FieldValidator;

const SKIP_INVALID: &str = "Invalid box data";
const SKIP_NO_PRODUCT: &str = "No product found for category and sub category";
const SKIP_INSUFFICIENT: &str = "Insufficient parts in box or box not found";
const SKIP_CAPACITY: &str = "Box quantity would exceed the allowed maximum";

struct LedgerEntry {
    box_no: String,
    quantity: i64,
}

/// Applies one damage request inside the caller's transaction.
pub async fn apply_damage(
    conn: &mut SqliteConnection,
    damaged_prefix: &str,
    category_id: &str,
    sub_category_id: &str,
    boxes: &[DamageBoxInput],
    action: DamageAction,
) -> ApiResult<DamageOutcome> {
    let mut outcome = DamageOutcome::default();
    let mut entries: Vec<LedgerEntry> = Vec::new();
    let mut product_id: Option<Option<String>> = None;

    for input in boxes {
        let box_no = non_empty(input.box_no.as_deref());
        let qty = FieldValidator::positive_qty(input.parts_qty.as_ref());

        let (box_no, qty) = match (box_no, qty) {
            (Some(box_no), Some(qty)) => (box_no, qty),
            (box_no, _) => {
                outcome.skipped.push(SkippedBox {
                    box_no: box_no.unwrap_or_default(),
                    reason: SKIP_INVALID.to_string(),
                });
                continue;
            }
        };

        if !box_no.starts_with(damaged_prefix) {
            if product_id.is_none() {
                product_id = Some(inventory::find_product_for(conn, category_id, sub_category_id).await?);
            }
            let Some(Some(product)) = product_id.as_ref() else {
                warn!("No product for category {} / sub category {}", category_id, sub_category_id);
                outcome.skipped.push(SkippedBox { box_no, reason: SKIP_NO_PRODUCT.to_string() });
                continue;
            };

            let (applied, reason) = match action {
                DamageAction::Add => (inventory::add_to_box(conn, product, &box_no, qty).await?, SKIP_CAPACITY),
                DamageAction::Out => {
                    let taken = match inventory::find_box(conn, product, &box_no).await? {
                        Some(existing) => inventory::take_from_box(conn, &existing.id, qty).await?,
                        None => false,
                    };
                    (taken, SKIP_INSUFFICIENT)
                }
            };
            if !applied {
                warn!("Damage {} skipped for box {}: {}", action.as_ref(), box_no, reason);
                outcome.skipped.push(SkippedBox { box_no, reason: reason.to_string() });
                continue;
            }
        }

        entries.push(LedgerEntry { box_no, quantity: qty });
    }

    let now = Utc::now();
    for entry in &entries {
        sqlx::query(
            r#"INSERT INTO damage_products
               (id, category_id, sub_category_id, box_no, quantity, action, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
            .bind(new_id())
            .bind(category_id)
            .bind(sub_category_id)
            .bind(&entry.box_no)
            .bind(entry.quantity)
            .bind(action.as_ref())
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }

    outcome.processed = entries.len();
    Ok(outcome)
}

/// `POST /add-or-out`
pub async fn add_or_out(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<DamageRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();

    let ids = request
        .category
        .as_deref()
        .and_then(parse_id)
        .zip(request.sub_category.as_deref().and_then(parse_id));
    let Some((category_id, sub_category_id)) = ids else {
        return Err(ApiError::bad_request("Invalid Category or SubCategory IDs"));
    };

    let boxes = match request.boxes {
        Some(boxes) if !boxes.is_empty() => boxes,
        _ => return Err(ApiError::bad_request("No valid boxes provided.")),
    };

    let action = request
        .action
        .as_deref()
        .map(str::trim)
        .and_then(|a| DamageAction::from_str(a).ok())
        .ok_or_else(|| ApiError::bad_request("Action must be either \"Add\" or \"Out\""))?;

    let pool = &app_state.db_pool;
    if !missing_ids(pool, "categories", &[category_id.clone()]).await?.is_empty()
        || !missing_ids(pool, "sub_categories", &[sub_category_id.clone()]).await?.is_empty()
    {
        return Err(ApiError::not_found("Category or SubCategory"));
    }

    let mut tx = pool.begin().await?;
    let outcome = apply_damage(
        &mut tx,
        &app_state.config.inventory.damaged_box_prefix,
        &category_id,
        &sub_category_id,
        &boxes,
        action,
    )
        .await?;
    tx.commit().await?;

    info!(
        "Damage {}: {} boxes processed, {} skipped",
        action,
        outcome.processed,
        outcome.skipped.len()
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        outcome,
        "Operation completed successfully.",
    )))
}

/// Ledger entries, newest first, with category and sub-category names.
pub async fn fetch_ledger(
    pool: &SqlitePool,
    range: Option<TimeRange>,
    page: Option<Page>,
) -> ApiResult<(Vec<DamageProductRecord>, i64)> {
    let mut filters = FilterBuilder::new();
    if let Some(range) = range {
        filters.add_time_range("d.created_at", range);
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM damage_products d{}", where_clause);
    let total: i64 = bind_scalar(sqlx::query_scalar(&count_sql), filters.params())
        .fetch_one(pool)
        .await?;

    let mut sql = format!(
        r#"SELECT d.id, d.category_id, c.name AS category_name,
                  d.sub_category_id, s.name AS sub_category_name,
                  d.box_no, d.quantity, d.action, d.created_at, d.updated_at
           FROM damage_products d
           LEFT JOIN categories c ON c.id = d.category_id
           LEFT JOIN sub_categories s ON s.id = d.sub_category_id{}
           ORDER BY d.created_at DESC, d.rowid DESC"#,
        where_clause
    );
    if let Some(page) = page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
    }

    let records = bind_query_as(sqlx::query_as::<_, DamageProductRecord>(&sql), filters.params())
        .fetch_all(pool)
        .await?;

    Ok((records, total))
}

/// Date range only when both bounds are given
pub fn ledger_range(start: Option<&str>, end: Option<&str>) -> ApiResult<Option<TimeRange>> {
    match (non_empty(start), non_empty(end)) {
        (Some(start), Some(end)) => Ok(Some(inclusive_range(&start, &end)?)),
        _ => Ok(None),
    }
}

/// `GET /all`
pub async fn get_damage_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<DamageListQuery>,
) -> ApiResult<HttpResponse> {
    let inventory = &app_state.config.inventory;
    let page = Page::normalize(query.page, query.limit, inventory.damage_page_size, inventory.max_page_size);
    let range = ledger_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    let (data, total_count) = fetch_ledger(&app_state.db_pool, range, Some(page)).await?;

    Ok(HttpResponse::Ok().json(DamageListResponse {
        success: true,
        data,
        total_count,
        current_page: page.page,
        total_pages: page.total_pages(total_count),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use crate::db::{fixtures, test_pool};

    fn boxes(items: &[(&str, i64)]) -> Vec<DamageBoxInput> {
        items
            .iter()
            .map(|(no, qty)| DamageBoxInput { box_no: Some(no.to_string()), parts_qty: Some(json!(qty)) })
            .collect()
    }

    async fn ledger_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM damage_products").fetch_one(pool).await.unwrap()
    }

    #[actix_rt::test]
    async fn test_add_increments_existing_and_appends_new() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 5)]).await;

        let mut tx = pool.begin().await.unwrap();
        let outcome = apply_damage(&mut tx, "D", &cat, &sub, &boxes(&[("B1", 3), ("B2", 4)]), DamageAction::Add)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.processed, 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(8));
        assert_eq!(fixtures::box_qty(&pool, &product, "B2").await, Some(4));
        assert_eq!(ledger_count(&pool).await, 2);
    }

    #[actix_rt::test]
    async fn test_out_skips_insufficient_and_missing_boxes() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 5), ("B2", 1)]).await;

        let mut tx = pool.begin().await.unwrap();
        let outcome = apply_damage(
            &mut tx, "D", &cat, &sub,
            &boxes(&[("B1", 2), ("B2", 3), ("B9", 1)]),
            DamageAction::Out,
        )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.processed, 1);
        let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.box_no.as_str()).collect();
        assert_eq!(skipped, vec!["B2", "B9"]);
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(3));
        assert_eq!(fixtures::box_qty(&pool, &product, "B2").await, Some(1));
        assert_eq!(ledger_count(&pool).await, 1);
    }

    #[actix_rt::test]
    async fn test_damaged_boxes_only_touch_ledger() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;

        // no product exists: regular boxes are skipped, damaged ones still logged
        let mut tx = pool.begin().await.unwrap();
        let outcome = apply_damage(
            &mut tx, "D", &cat, &sub,
            &boxes(&[("D-01", 2), ("B1", 2)]),
            DamageAction::Out,
        )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.skipped[0].reason, SKIP_NO_PRODUCT);
        let box_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_boxes")
            .fetch_one(&pool).await.unwrap();
        assert_eq!(box_rows, 0);
        assert_eq!(ledger_count(&pool).await, 1);
    }

    #[actix_rt::test]
    async fn test_invalid_boxes_are_skipped() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        fixtures::product(&pool, &cat, &sub, &[("B1", 5)]).await;

        let input = vec![
            DamageBoxInput { box_no: Some("".into()), parts_qty: Some(json!(2)) },
            DamageBoxInput { box_no: Some("B1".into()), parts_qty: Some(json!(0)) },
            DamageBoxInput { box_no: Some("B1".into()), parts_qty: Some(json!("x")) },
            DamageBoxInput { box_no: None, parts_qty: None },
        ];
        let mut tx = pool.begin().await.unwrap();
        let outcome = apply_damage(&mut tx, "D", &cat, &sub, &input, DamageAction::Add).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.skipped.len(), 4);
        assert_eq!(ledger_count(&pool).await, 0);
    }

    #[actix_rt::test]
    async fn test_oversized_quantities_leave_product_readable() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 5), ("B2", crate::validator::MAX_QTY)]).await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/damage-products/add-or-out")
            .set_json(json!({
                "category": cat,
                "subCategory": sub,
                "boxes": [
                    { "boxNo": "B1", "partsQty": "9223372036854775807" },
                    { "boxNo": "B2", "partsQty": 1 }
                ],
                "action": "Add"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["processed"], 0);
        assert_eq!(body["data"]["skipped"][0]["reason"], SKIP_INVALID);
        assert_eq!(body["data"]["skipped"][1]["reason"], SKIP_CAPACITY);
        assert_eq!(ledger_count(&pool).await, 0);

        let req = test::TestRequest::get().uri(&format!("/api/v1/products/{}", product)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(5));
    }

    #[actix_rt::test]
    async fn test_add_or_out_request_validation() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/damage-products/add-or-out")
            .set_json(json!({ "subCategory": sub, "boxes": [{ "boxNo": "B1", "partsQty": 1 }], "action": "Add" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid Category or SubCategory IDs");

        let req = test::TestRequest::post()
            .uri("/api/v1/damage-products/add-or-out")
            .set_json(json!({ "category": cat, "subCategory": sub, "boxes": [], "action": "Add" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "No valid boxes provided.");

        let req = test::TestRequest::post()
            .uri("/api/v1/damage-products/add-or-out")
            .set_json(json!({ "category": cat, "subCategory": sub, "boxes": [{ "boxNo": "B1", "partsQty": 1 }], "action": "Move" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/damage-products/add-or-out")
            .set_json(json!({ "category": crate::handlers::new_id(), "subCategory": sub, "boxes": [{ "boxNo": "D7", "partsQty": 1 }], "action": "Add" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/v1/damage-products/add-or-out")
            .set_json(json!({ "category": cat, "subCategory": sub, "boxes": [{ "boxNo": "D7", "partsQty": "3" }], "action": "Add" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Operation completed successfully.");
        assert_eq!(body["data"]["processed"], 1);
    }

    #[actix_rt::test]
    async fn test_get_all_respects_page_and_limit_bounds() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let input: Vec<(String, i64)> = (0..12).map(|i| (format!("D{}", i), 1)).collect();
        let refs: Vec<(&str, i64)> = input.iter().map(|(n, q)| (n.as_str(), *q)).collect();

        let mut tx = pool.begin().await.unwrap();
        apply_damage(&mut tx, "D", &cat, &sub, &boxes(&refs), DamageAction::Add).await.unwrap();
        tx.commit().await.unwrap();

        let app = test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = test::TestRequest::get().uri("/api/v1/damage-products/all").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 10);
        assert_eq!(body["totalCount"], 12);
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["data"][0]["categoryName"], "Dome");

        let req = test::TestRequest::get().uri("/api/v1/damage-products/all?page=2").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::get().uri("/api/v1/damage-products/all?page=0&limit=0").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["totalPages"], 12);

        let req = test::TestRequest::get().uri("/api/v1/damage-products/all?limit=1000").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 12);
        assert_eq!(body["totalPages"], 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/damage-products/all?page=9223372036854775807&limit=10")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["data"].as_array().unwrap().is_empty());
        assert_eq!(body["totalCount"], 12);

        // a single bound is ignored
        let req = test::TestRequest::get()
            .uri("/api/v1/damage-products/all?startDate=2001-01-01")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalCount"], 12);

        let req = test::TestRequest::get()
            .uri("/api/v1/damage-products/all?startDate=2001-01-01&endDate=2001-12-31")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalCount"], 0);
    }
}
