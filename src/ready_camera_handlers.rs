// src/ready_camera_handlers.rs
//! Assembled cameras. Part UIDs are unique across every record.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use log::info;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{new_id, non_empty, require_id, ApiResponse, PaginatedResponse};
use crate::models::*;
use crate::pagination::{bind_query_as, bind_scalar, day_range, escape_like, FilterBuilder, Page, SqlParam};
use crate::validator::{check_camera_boxes, uid_conflict};

const CAMERA_SELECT: &str = r#"
    SELECT r.id, r.category_id, c.name AS category_name, r.description, r.created_at, r.updated_at
    FROM ready_cameras r
    JOIN categories c ON c.id = r.category_id"#;

const UID_LOCATION_SELECT: &str = r#"
    SELECT u.uid, rb.ready_camera_id, rb.id AS box_id, rb.box_no, c.name AS category_name
    FROM ready_camera_part_uids u
    JOIN ready_camera_boxes rb ON rb.id = u.ready_camera_box_id
    JOIN ready_cameras r ON r.id = rb.ready_camera_id
    JOIN categories c ON c.id = r.category_id
    WHERE u.uid = ?"#;

#[derive(Debug, sqlx::FromRow)]
struct BoxRow {
    id: String,
    box_no: String,
}

async fn load_camera(conn: &mut SqliteConnection, row: ReadyCameraRow) -> ApiResult<ReadyCamera> {
    let box_rows = sqlx::query_as::<_, BoxRow>(
        "SELECT id, box_no FROM ready_camera_boxes WHERE ready_camera_id = ? ORDER BY position",
    )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

    let mut boxes = Vec::with_capacity(box_rows.len());
    for b in box_rows {
        let part_uids: Vec<String> = sqlx::query_scalar(
            "SELECT uid FROM ready_camera_part_uids WHERE ready_camera_box_id = ? ORDER BY position",
        )
            .bind(&b.id)
            .fetch_all(&mut *conn)
            .await?;

        boxes.push(ReadyCameraBox {
            id: b.id,
            box_no: b.box_no,
            total_parts: part_uids.len(),
            part_uids,
        });
    }

    Ok(ReadyCamera {
        id: row.id,
        category: NamedRef { id: row.category_id, name: row.category_name },
        boxes,
        description: row.description,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn locate_uid(conn: &mut SqliteConnection, uid: &str) -> ApiResult<Option<UidLocation>> {
    let location = sqlx::query_as::<_, UidLocation>(UID_LOCATION_SELECT)
        .bind(uid)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(location)
}

pub async fn create_ready_camera(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateReadyCameraRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    let category_id = require_id(request.category.as_deref(), "Category")?;
    let boxes = check_camera_boxes(&request.boxes)?;

    let mut tx = app_state.db_pool.begin().await?;

    let category_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
        .bind(&category_id)
        .fetch_one(&mut *tx)
        .await?;
    if category_exists == 0 {
        return Err(ApiError::not_found("Category"));
    }

    for b in &boxes {
        for uid in &b.part_uids {
            if let Some(stored) = locate_uid(&mut tx, uid).await? {
                return Err(uid_conflict(uid, &stored.box_no));
            }
        }
    }

    let id = new_id();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO ready_cameras (id, category_id, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
        .bind(&id)
        .bind(&category_id)
        .bind(request.description.as_deref().map(str::trim).unwrap_or(""))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    for (position, b) in boxes.iter().enumerate() {
        let box_id = new_id();
        sqlx::query(
            "INSERT INTO ready_camera_boxes (id, ready_camera_id, box_no, position) VALUES (?, ?, ?, ?)",
        )
            .bind(&box_id)
            .bind(&id)
            .bind(&b.box_no)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;

        for (uid_position, uid) in b.part_uids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO ready_camera_part_uids (uid, ready_camera_box_id, position) VALUES (?, ?, ?)",
            )
                .bind(uid)
                .bind(&box_id)
                .bind(uid_position as i64)
                .execute(&mut *tx)
                .await?;
        }
    }

    let row: ReadyCameraRow = sqlx::query_as(&format!("{} WHERE r.id = ?", CAMERA_SELECT))
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
    let camera = load_camera(&mut tx, row).await?;
    tx.commit().await?;

    info!(
        "Ready camera created: {} boxes, {} part UIDs",
        camera.boxes.len(),
        camera.boxes.iter().map(|b| b.total_parts).sum::<usize>()
    );
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(camera, "Ready camera created successfully")))
}

fn history_filters(query: &ReadyCameraQuery) -> ApiResult<FilterBuilder> {
    let mut filters = FilterBuilder::new();

    if let Some(date) = non_empty(query.date.as_deref()) {
        filters.add_time_range("r.created_at", day_range(&date)?);
    }
    if let Some(category) = non_empty(query.category.as_deref()) {
        filters.add_exact("c.name", &category);
    }
    if let Some(uid) = non_empty(query.uid.as_deref()) {
        filters.add_raw(
            r#"EXISTS (SELECT 1 FROM ready_camera_boxes rb
                       JOIN ready_camera_part_uids u ON u.ready_camera_box_id = rb.id
                       WHERE rb.ready_camera_id = r.id AND LOWER(u.uid) LIKE ? ESCAPE '\')"#,
            vec![SqlParam::Text(format!("%{}%", escape_like(&uid.to_lowercase())))],
        );
    }

    Ok(filters)
}

/// Filtered ready cameras, newest first. All of them when `page` is `None`.
pub async fn fetch_history(
    pool: &SqlitePool,
    query: &ReadyCameraQuery,
    page: Option<Page>,
) -> ApiResult<(Vec<ReadyCamera>, i64)> {
    let filters = history_filters(query)?;
    let where_clause = filters.where_clause();

    let count_sql = format!(
        "SELECT COUNT(*) FROM ready_cameras r JOIN categories c ON c.id = r.category_id{}",
        where_clause
    );
    let total: i64 = bind_scalar(sqlx::query_scalar(&count_sql), filters.params())
        .fetch_one(pool)
        .await?;

    let mut sql = format!("{}{} ORDER BY r.created_at DESC, r.rowid DESC", CAMERA_SELECT, where_clause);
    if let Some(page) = page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
    }

    let rows = bind_query_as(sqlx::query_as::<_, ReadyCameraRow>(&sql), filters.params())
        .fetch_all(pool)
        .await?;

    let mut conn = pool.acquire().await?;
    let mut cameras = Vec::with_capacity(rows.len());
    for row in rows {
        cameras.push(load_camera(&mut conn, row).await?);
    }

    Ok((cameras, total))
}

pub async fn get_ready_cameras(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<ReadyCameraQuery>,
) -> ApiResult<HttpResponse> {
    let inventory = &app_state.config.inventory;
    let page = Page::normalize(query.page, query.limit, inventory.ready_camera_page_size, inventory.max_page_size);

    let (items, total_count) = fetch_history(&app_state.db_pool, &query, Some(page)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse {
        items,
        total_count,
        current_page: page.page,
        limit: page.limit,
        total_pages: page.total_pages(total_count),
    })))
}

pub async fn find_uid(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let uid = path.trim().to_string();
    let mut conn = app_state.db_pool.acquire().await?;
    let location = locate_uid(&mut conn, &uid)
        .await?
        .ok_or_else(|| ApiError::not_found("Part UID"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(location)))
}
