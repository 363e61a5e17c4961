// src/import_export.rs
//! CSV exports of the history screens and staged spreadsheet uploads.

use actix_web::{web, HttpResponse};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use crate::AppState;
use crate::models::*;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{new_id, non_empty, parse_id, require_id, ApiResponse};
use crate::inventory;
use crate::repositories::missing_ids;
use crate::validator::MAX_QTY;
use crate::{damage_handlers, out_product_handlers, ready_camera_handlers};
use chrono::{DateTime, Utc};
use calamine::Reader;
use actix_multipart::Multipart;
use futures_util::stream::StreamExt;
use validator::Validate;
use log::{info, warn};

// ==================== CSV EXPORT ====================

fn display_date(value: &DateTime<Utc>) -> String {
    value.format("%d/%m/%Y").to_string()
}

fn csv_response(filename: &str, headers: &[&str], rows: Vec<Vec<String>>) -> ApiResult<HttpResponse> {
    let mut csv_data = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut csv_data);
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer.flush().map_err(|e| ApiError::InternalServerError(e.to_string()))?;
    }

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{}\"", filename)))
        .body(csv_data))
}

pub async fn export_out_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<OutProductQuery>,
) -> ApiResult<HttpResponse> {
    let (records, _) = out_product_handlers::fetch_history(&app_state.db_pool, &query, None).await?;

    let rows = records
        .into_iter()
        .map(|r| {
            vec![
                display_date(&r.created_at),
                r.category_name,
                r.sub_category_name,
                r.sub_category_code,
                r.box_no,
                r.quantity.to_string(),
            ]
        })
        .collect();

    csv_response(
        "Out_Parts_History.csv",
        &["Date", "Category Name", "Sub Category Name", "Sub Category Code", "Box No.", "Quantity"],
        rows,
    )
}

pub async fn export_damage_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<DamageListQuery>,
) -> ApiResult<HttpResponse> {
    let range = damage_handlers::ledger_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let (records, _) = damage_handlers::fetch_ledger(&app_state.db_pool, range, None).await?;

    let rows = records
        .into_iter()
        .map(|r| {
            vec![
                display_date(&r.created_at),
                r.category_name.unwrap_or_default(),
                r.sub_category_name.unwrap_or_default(),
                r.box_no,
                r.quantity.to_string(),
                r.action,
            ]
        })
        .collect();

    csv_response(
        "Damage_Products_History.csv",
        &["Date", "Category Name", "Sub Category Name", "Box No.", "Quantity", "Action"],
        rows,
    )
}

/// One row per box
pub async fn export_ready_cameras(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<ReadyCameraQuery>,
) -> ApiResult<HttpResponse> {
    let (cameras, _) = ready_camera_handlers::fetch_history(&app_state.db_pool, &query, None).await?;

    let mut rows = Vec::new();
    for camera in cameras {
        let date = display_date(&camera.created_at);
        for b in camera.boxes {
            rows.push(vec![
                camera.category.name.clone(),
                b.box_no,
                b.part_uids.join(", "),
                b.total_parts.to_string(),
                date.clone(),
            ]);
        }
    }

    csv_response(
        "Ready_Camera_History.csv",
        &["Category Name", "Box No.", "Part UID", "Total Qty", "Date"],
        rows,
    )
}

// ==================== SPREADSHEET STAGING ====================

/// Lower-cased header with spaces, underscores and dashes removed
fn header_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn column_for(key: &str) -> Option<&'static str> {
    match key {
        "partsname" | "partname" => Some("partsName"),
        "partscode" | "partcode" => Some("partsCode"),
        "boxno" | "boxnumber" => Some("boxNo"),
        "qty" | "quantity" => Some("qty"),
        _ => None,
    }
}

/// Converts sheet cells (header row first) into upload rows. Rows are
/// numbered as in the spreadsheet, the header being row 1.
fn rows_from_cells(cells: Vec<Vec<String>>) -> ApiResult<(Vec<(usize, ImportUploadRow)>, Vec<String>)> {
    let mut lines = cells.into_iter();
    let header = lines.next().ok_or_else(|| ApiError::bad_request("Spreadsheet is empty"))?;

    let columns: HashMap<&'static str, usize> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, raw)| column_for(&header_key(raw)).map(|col| (col, idx)))
        .collect();

    let missing: Vec<&str> = ["partsName", "partsCode", "boxNo", "qty"]
        .into_iter()
        .filter(|col| !columns.contains_key(col))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!("Missing columns: {}", missing.join(", "))));
    }

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in lines.enumerate() {
        let row_no = idx + 2;
        if line.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cell = |col: &str| {
            columns
                .get(col)
                .and_then(|&i| line.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let qty = match cell("qty").parse::<f64>() {
            Ok(q) if q.fract() == 0.0 && q.abs() <= MAX_QTY as f64 => q as i64,
            Ok(q) if q.fract() == 0.0 => {
                errors.push(format!("Row {}: qty must not exceed {}", row_no, MAX_QTY));
                continue;
            }
            _ => {
                errors.push(format!("Row {}: qty must be a whole number", row_no));
                continue;
            }
        };

        rows.push((row_no, ImportUploadRow {
            parts_name: cell("partsName"),
            parts_code: cell("partsCode"),
            box_no: cell("boxNo"),
            qty,
        }));
    }

    Ok((rows, errors))
}

fn sheet_cells(bytes: &[u8]) -> ApiResult<Vec<Vec<String>>> {
    let reader = std::io::Cursor::new(bytes);

    let mut workbook = calamine::open_workbook_auto_from_rs(reader)
        .map_err(|e| ApiError::BadRequest(format!("Failed to read Excel file: {}", e)))?;

    let sheet_name = workbook.sheet_names().first()
        .ok_or_else(|| ApiError::bad_request("Excel file has no sheets"))?
        .clone();

    let range = workbook.worksheet_range(&sheet_name)
        .map_err(|e| ApiError::BadRequest(format!("Failed to read sheet: {}", e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect())
}

async fn checked_target(
    pool: &sqlx::SqlitePool,
    category: Option<&str>,
    sub_category: Option<&str>,
) -> ApiResult<(String, String)> {
    let category_id = require_id(category, "Category")?;
    let sub_category_id = require_id(sub_category, "SubCategory")?;

    if !missing_ids(pool, "categories", &[category_id.clone()]).await?.is_empty() {
        return Err(ApiError::not_found("Category"));
    }
    if !missing_ids(pool, "sub_categories", &[sub_category_id.clone()]).await?.is_empty() {
        return Err(ApiError::not_found("SubCategory"));
    }
    Ok((category_id, sub_category_id))
}

/// Inserts valid rows as `Pending` uploads in one transaction.
async fn stage_rows(
    pool: &sqlx::SqlitePool,
    category_id: &str,
    sub_category_id: &str,
    rows: Vec<(usize, ImportUploadRow)>,
    mut errors: Vec<String>,
) -> ApiResult<ImportSummary> {
    let total = rows.len() + errors.len();
    let mut imported = 0;
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for (row_no, row) in rows {
        let row = ImportUploadRow {
            parts_name: row.parts_name.trim().to_string(),
            parts_code: row.parts_code.trim().to_string(),
            box_no: row.box_no.trim().to_string(),
            qty: row.qty,
        };
        if let Err(e) = row.validate() {
            errors.push(format!("Row {}: {}", row_no, e));
            continue;
        }

        sqlx::query(
            r#"INSERT INTO excel_uploads
               (id, parts_name, parts_code, box_no, qty, category_id, sub_category_id, status, remark, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, '', ?, ?)"#,
        )
            .bind(new_id())
            .bind(&row.parts_name)
            .bind(&row.parts_code)
            .bind(&row.box_no)
            .bind(row.qty)
            .bind(category_id)
            .bind(sub_category_id)
            .bind(UploadStatus::Pending.as_ref())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        imported += 1;
    }

    tx.commit().await?;

    if !errors.is_empty() {
        warn!("Spreadsheet import: {} rows rejected", errors.len());
    }
    info!("Spreadsheet import: {} of {} rows staged", imported, total);

    Ok(ImportSummary { imported, total, errors })
}

/// `multipart/form-data` with the workbook in a file field. Target ids come
/// from text fields `category` / `subCategory` or the query string.
pub async fn import_excel_uploads(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<UploadTargetQuery>,
    mut payload: Multipart,
) -> ApiResult<HttpResponse> {
    let max_bytes = app_state.config.inventory.max_upload_bytes;
    let mut target = query.into_inner();
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?;
        let name = field.name().to_string();
        let is_file = field.content_disposition().get_filename().is_some();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError::BadRequest(format!("File exceeds {} bytes", max_bytes)));
            }
            data.extend_from_slice(&chunk);
        }

        if is_file {
            file = Some(data);
            continue;
        }
        let text = String::from_utf8_lossy(&data).trim().to_string();
        match name.as_str() {
            "category" => target.category = Some(text),
            "subCategory" => target.sub_category = Some(text),
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let pool = &app_state.db_pool;
    let (category_id, sub_category_id) =
        checked_target(pool, target.category.as_deref(), target.sub_category.as_deref()).await?;

    let cells = tokio::task::spawn_blocking(move || sheet_cells(&bytes))
        .await
        .map_err(|e| ApiError::InternalServerError(format!("Spreadsheet parsing failed: {}", e)))??;
    let (rows, errors) = rows_from_cells(cells)?;
    let summary = stage_rows(pool, &category_id, &sub_category_id, rows, errors).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(summary, "Excel file imported")))
}

pub async fn import_excel_uploads_json(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<ImportUploadsRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    let pool = &app_state.db_pool;
    let (category_id, sub_category_id) =
        checked_target(pool, request.category.as_deref(), request.sub_category.as_deref()).await?;

    if request.rows.is_empty() {
        return Err(ApiError::bad_request("No rows provided"));
    }

    let rows = request.rows.into_iter().enumerate().map(|(idx, r)| (idx + 1, r)).collect();
    let summary = stage_rows(pool, &category_id, &sub_category_id, rows, Vec::new()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(summary, "Rows imported")))
}

pub async fn get_excel_uploads(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<UploadListQuery>,
) -> ApiResult<HttpResponse> {
    let uploads: Vec<ExcelUpload> = match non_empty(query.status.as_deref()) {
        Some(raw) => {
            let status = UploadStatus::from_str(&raw)
                .map_err(|_| ApiError::BadRequest(format!("Unknown status '{}'", raw)))?;
            sqlx::query_as("SELECT * FROM excel_uploads WHERE status = ? ORDER BY created_at DESC, rowid DESC")
                .bind(status.as_ref())
                .fetch_all(&app_state.db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM excel_uploads ORDER BY created_at DESC, rowid DESC")
                .fetch_all(&app_state.db_pool)
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(uploads)))
}

async fn set_status(
    conn: &mut sqlx::SqliteConnection,
    id: &str,
    status: UploadStatus,
    remark: &str,
) -> ApiResult<ExcelUpload> {
    sqlx::query("UPDATE excel_uploads SET status = ?, remark = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(remark)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let upload = sqlx::query_as("SELECT * FROM excel_uploads WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(upload)
}

async fn pending_upload(conn: &mut sqlx::SqliteConnection, raw_id: &str) -> ApiResult<ExcelUpload> {
    let id = parse_id(raw_id).ok_or_else(|| ApiError::invalid_id("Upload"))?;
    let upload: ExcelUpload = sqlx::query_as("SELECT * FROM excel_uploads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Upload"))?;

    if upload.status != UploadStatus::Pending.as_ref() {
        return Err(ApiError::BadRequest(format!("Upload is already {}", upload.status)));
    }
    Ok(upload)
}

async fn reject_pending(
    mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
    upload: &ExcelUpload,
    remark: &str,
) -> ApiResult<HttpResponse> {
    let rejected = set_status(&mut tx, &upload.id, UploadStatus::Rejected, remark).await?;
    tx.commit().await?;
    warn!("Upload {} rejected: {}", upload.id, remark);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(rejected, remark)))
}

/// Adds a pending row's quantity to its box. Rows that cannot be applied are
/// marked `Rejected` with a remark instead of failing the request.
pub async fn apply_excel_upload(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let mut tx = app_state.db_pool.begin().await?;
    let upload = pending_upload(&mut tx, &path).await?;

    if upload.box_no.starts_with(&app_state.config.inventory.damaged_box_prefix) {
        return reject_pending(tx, &upload, "Damaged boxes are recorded in the damage ledger only").await;
    }

    let product = inventory::find_product_for(&mut tx, &upload.category_id, &upload.sub_category_id).await?;
    let Some(product_id) = product else {
        return reject_pending(tx, &upload, "No product found for category and sub category").await;
    };

    if !inventory::add_to_box(&mut tx, &product_id, &upload.box_no, upload.qty).await? {
        return reject_pending(tx, &upload, "Box quantity would exceed the allowed maximum").await;
    }
    let applied = set_status(&mut tx, &upload.id, UploadStatus::Applied, "").await?;
    tx.commit().await?;

    info!("Upload {} applied: +{} to box {}", applied.id, applied.qty, applied.box_no);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(applied, "Upload applied")))
}

pub async fn reject_excel_upload(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<RejectUploadRequest>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let remark = body.remark.as_deref().map(str::trim).unwrap_or("");

    let mut tx = app_state.db_pool.begin().await?;
    let upload = pending_upload(&mut tx, &path).await?;
    let rejected = set_status(&mut tx, &upload.id, UploadStatus::Rejected, remark).await?;
    tx.commit().await?;

    info!("Upload {} rejected", rejected.id);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(rejected, "Upload rejected")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use serde_json::{json, Value};
    use crate::db::{fixtures, test_pool};

    fn cells(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect()
    }

    #[test]
    fn test_header_matching_is_loose() {
        assert_eq!(column_for(&header_key("Parts Name")), Some("partsName"));
        assert_eq!(column_for(&header_key("parts_code")), Some("partsCode"));
        assert_eq!(column_for(&header_key(" BoxNo ")), Some("boxNo"));
        assert_eq!(column_for(&header_key("QTY")), Some("qty"));
        assert_eq!(column_for(&header_key("Remarks")), None);
    }

    #[test]
    fn test_rows_from_cells() {
        let (rows, errors) = rows_from_cells(cells(&[
            &["Box No", "Parts Name", "Parts Code", "Qty"],
            &["B1", "Lens", "LN-1", "5"],
            &["", "", "", ""],
            &["B2", "Board", "BD-1", "2.5"],
            &["B3", "Board", "BD-1", "7"],
            &["B4", "Board", "BD-1", "1e30"],
        ]))
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1.box_no, "B1");
        assert_eq!(rows[0].1.parts_name, "Lens");
        assert_eq!(rows[1].0, 5);
        assert_eq!(rows[1].1.qty, 7);
        assert_eq!(
            errors,
            vec![
                "Row 4: qty must be a whole number".to_string(),
                "Row 6: qty must not exceed 1000000000".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_columns_reported() {
        let err = rows_from_cells(cells(&[&["Parts Name", "Qty"]])).unwrap_err();
        assert_eq!(err.to_string(), "Missing columns: partsCode, boxNo");
        assert!(rows_from_cells(Vec::new()).is_err());
    }

    #[test]
    fn test_garbage_is_not_a_workbook() {
        assert!(matches!(sheet_cells(b"not a spreadsheet"), Err(ApiError::BadRequest(_))));
    }

    #[actix_rt::test]
    async fn test_stage_apply_and_reject() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", 5)]).await;
        let app = actix_test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/excel-uploads/import/json")
            .set_json(json!({
                "category": cat,
                "subCategory": sub,
                "rows": [
                    { "partsName": "Lens", "partsCode": "LN-1", "boxNo": "B1", "qty": 3 },
                    { "partsName": "Lens", "partsCode": "LN-1", "boxNo": "B8", "qty": 2 },
                    { "partsName": "", "partsCode": "LN-1", "boxNo": "B9", "qty": 1 }
                ]
            }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["imported"], 2);
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["errors"].as_array().unwrap().len(), 1);

        let req = actix_test::TestRequest::get().uri("/api/v1/excel-uploads?status=Pending").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        let uploads = body["data"].as_array().unwrap().clone();
        assert_eq!(uploads.len(), 2);
        let id_for = |box_no: &str| {
            uploads
                .iter()
                .find(|u| u["boxNo"] == box_no)
                .and_then(|u| u["_id"].as_str())
                .unwrap()
                .to_string()
        };
        let (b1_upload, b8_upload) = (id_for("B1"), id_for("B8"));

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/excel-uploads/{}/apply", b1_upload))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "Applied");
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(8));

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/excel-uploads/{}/apply", b1_upload))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/excel-uploads/{}/reject", b8_upload))
            .set_json(json!({ "remark": "wrong box" }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "Rejected");
        assert_eq!(body["data"]["remark"], "wrong box");
        assert_eq!(fixtures::box_qty(&pool, &product, "B8").await, None);

        let req = actix_test::TestRequest::get().uri("/api/v1/excel-uploads?status=Bogus").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_apply_without_product_rejects_row() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let rows = vec![(1, ImportUploadRow {
            parts_name: "Lens".into(),
            parts_code: "LN-1".into(),
            box_no: "B1".into(),
            qty: 1,
        })];
        stage_rows(&pool, &cat, &sub, rows, Vec::new()).await.unwrap();
        let id: String = sqlx::query_scalar("SELECT id FROM excel_uploads").fetch_one(&pool).await.unwrap();

        let app = actix_test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;
        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/excel-uploads/{}/apply", id))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "Rejected");
        assert_eq!(body["data"]["remark"], "No product found for category and sub category");
    }

    #[actix_rt::test]
    async fn test_apply_rejects_damaged_and_overfull_boxes() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let sub = fixtures::sub_category(&pool, "Lens", &[&cat]).await;
        let product = fixtures::product(&pool, &cat, &sub, &[("B1", MAX_QTY)]).await;
        let row = |box_no: &str| ImportUploadRow {
            parts_name: "Lens".into(),
            parts_code: "LN-1".into(),
            box_no: box_no.into(),
            qty: 4,
        };
        stage_rows(&pool, &cat, &sub, vec![(1, row("D1")), (2, row("B1"))], Vec::new()).await.unwrap();
        let id_for = |box_no: &'static str| {
            let pool = pool.clone();
            async move {
                sqlx::query_scalar::<_, String>("SELECT id FROM excel_uploads WHERE box_no = ?")
                    .bind(box_no)
                    .fetch_one(&pool)
                    .await
                    .unwrap()
            }
        };
        let (damaged, overfull) = (id_for("D1").await, id_for("B1").await);

        let app = actix_test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/excel-uploads/{}/apply", damaged))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "Rejected");
        assert_eq!(body["data"]["remark"], "Damaged boxes are recorded in the damage ledger only");
        assert_eq!(fixtures::box_qty(&pool, &product, "D1").await, None);

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/excel-uploads/{}/apply", overfull))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "Rejected");
        assert_eq!(body["data"]["remark"], "Box quantity would exceed the allowed maximum");
        assert_eq!(fixtures::box_qty(&pool, &product, "B1").await, Some(MAX_QTY));
    }

    #[actix_rt::test]
    async fn test_csv_exports() {
        let pool = test_pool().await;
        let cat = fixtures::category(&pool, "Dome").await;
        let app = actix_test::init_service(
            App::new().app_data(crate::test_state(pool.clone())).configure(crate::configure_routes),
        ).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/ready-cameras")
            .set_json(json!({
                "category": cat,
                "boxes": [{ "boxNo": "RC-1", "partUIDs": ["ABCD-123456-EFGHI", "ABCD-123457-EFGHI"] }]
            }))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = actix_test::TestRequest::get().uri("/api/v1/ready-cameras/export").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Content-Disposition").unwrap().to_str().unwrap(),
            "attachment; filename=\"Ready_Camera_History.csv\""
        );
        let body = actix_test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Category Name,Box No.,Part UID,Total Qty,Date"));
        let today = Utc::now().format("%d/%m/%Y").to_string();
        assert_eq!(
            lines.next(),
            Some(format!("Dome,RC-1,\"ABCD-123456-EFGHI, ABCD-123457-EFGHI\",2,{}", today).as_str())
        );

        let req = actix_test::TestRequest::get().uri("/api/v1/out-products/export").to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.trim(), "Date,Category Name,Sub Category Name,Sub Category Code,Box No.,Quantity");

        let req = actix_test::TestRequest::get().uri("/api/v1/damage-products/export").to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("Date,Category Name,Sub Category Name,Box No.,Quantity,Action"));
    }
}
