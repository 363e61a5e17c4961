// src/inventory.rs
//! Box reconciliation shared by products, out-products, damage entries and
//! spreadsheet uploads. Every function takes a connection so callers can run
//! it inside their own transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use crate::error::ApiResult;
use crate::handlers::new_id;
use crate::models::*;
use crate::validator::MAX_QTY;

// ==================== COMBINE ====================

/// Merges boxes sharing a `boxNo`: first-seen order, first `_id`, summed qty.
pub fn combine_boxes<'a, I>(boxes: I) -> Vec<CombinedBox>
where
    I: IntoIterator<Item = &'a ProductBox>,
{
    let mut combined: Vec<CombinedBox> = Vec::new();

    for b in boxes {
        match combined.iter_mut().find(|c| c.box_no == b.box_no) {
            Some(existing) => existing.parts_qty = existing.parts_qty.saturating_add(b.parts_qty),
            None => combined.push(CombinedBox {
                id: b.id.clone(),
                box_no: b.box_no.clone(),
                parts_qty: b.parts_qty,
            }),
        }
    }

    combined
}

// ==================== LOADING ====================

async fn product_categories(conn: &mut SqliteConnection, product_id: &str) -> ApiResult<Vec<NamedRef>> {
    let refs = sqlx::query_as::<_, NamedRef>(
        r#"SELECT c.id, c.name
           FROM product_categories pc
           JOIN categories c ON c.id = pc.category_id
           WHERE pc.product_id = ?
           ORDER BY pc.position"#,
    )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(refs)
}

async fn product_sub_categories(conn: &mut SqliteConnection, product_id: &str) -> ApiResult<Vec<NamedRef>> {
    let refs = sqlx::query_as::<_, NamedRef>(
        r#"SELECT s.id, s.name
           FROM product_sub_categories ps
           JOIN sub_categories s ON s.id = ps.sub_category_id
           WHERE ps.product_id = ?
           ORDER BY ps.position"#,
    )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(refs)
}

pub async fn product_boxes(conn: &mut SqliteConnection, product_id: &str) -> ApiResult<Vec<ProductBox>> {
    let boxes = sqlx::query_as::<_, ProductBox>(
        "SELECT * FROM product_boxes WHERE product_id = ? ORDER BY position",
    )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(boxes)
}

/// Populates references and boxes of a stored product row.
pub async fn load_product(conn: &mut SqliteConnection, row: ProductRow) -> ApiResult<Product> {
    let category = product_categories(conn, &row.id).await?;
    let sub_category = product_sub_categories(conn, &row.id).await?;
    let boxes = product_boxes(conn, &row.id).await?;
    let more_details = serde_json::from_str(&row.more_details)
        .unwrap_or_else(|_| serde_json::json!({}));

    Ok(Product {
        id: row.id,
        category,
        sub_category,
        boxes,
        description: row.description,
        more_details,
        publish: row.publish,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> ApiResult<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(load_product(conn, row).await?)),
        None => Ok(None),
    }
}

/// Products linked to both the category and the sub-category, oldest first.
pub async fn products_for(
    conn: &mut SqliteConnection,
    category_id: &str,
    sub_category_id: &str,
) -> ApiResult<Vec<Product>> {
    let rows = sqlx::query_as::<_, ProductRow>(
        r#"SELECT p.* FROM products p
           WHERE EXISTS (SELECT 1 FROM product_categories pc
                         WHERE pc.product_id = p.id AND pc.category_id = ?)
             AND EXISTS (SELECT 1 FROM product_sub_categories ps
                         WHERE ps.product_id = p.id AND ps.sub_category_id = ?)
           ORDER BY p.created_at ASC, p.rowid ASC"#,
    )
        .bind(category_id)
        .bind(sub_category_id)
        .fetch_all(&mut *conn)
        .await?;

    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        products.push(load_product(conn, row).await?);
    }
    Ok(products)
}

/// Id of the first (oldest) product linked to both references.
pub async fn find_product_for(
    conn: &mut SqliteConnection,
    category_id: &str,
    sub_category_id: &str,
) -> ApiResult<Option<String>> {
    let id = sqlx::query_scalar::<_, String>(
        r#"SELECT p.id FROM products p
           WHERE EXISTS (SELECT 1 FROM product_categories pc
                         WHERE pc.product_id = p.id AND pc.category_id = ?)
             AND EXISTS (SELECT 1 FROM product_sub_categories ps
                         WHERE ps.product_id = p.id AND ps.sub_category_id = ?)
           ORDER BY p.created_at ASC, p.rowid ASC
           LIMIT 1"#,
    )
        .bind(category_id)
        .bind(sub_category_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

pub async fn find_box(
    conn: &mut SqliteConnection,
    product_id: &str,
    box_no: &str,
) -> ApiResult<Option<ProductBox>> {
    let b = sqlx::query_as::<_, ProductBox>(
        "SELECT * FROM product_boxes WHERE product_id = ? AND box_no = ?",
    )
        .bind(product_id)
        .bind(box_no)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(b)
}

// ==================== ADJUSTMENTS ====================

async fn touch_product(conn: &mut SqliteConnection, product_id: &str, now: DateTime<Utc>) -> ApiResult<()> {
    sqlx::query("UPDATE products SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Increments `box_no` of the product, appending the box when it is new.
/// `false` when the box would end up holding more than `MAX_QTY`.
pub async fn add_to_box(
    conn: &mut SqliteConnection,
    product_id: &str,
    box_no: &str,
    qty: i64,
) -> ApiResult<bool> {
    if !(1..=MAX_QTY).contains(&qty) {
        return Ok(false);
    }

    let updated = sqlx::query(
        r#"UPDATE product_boxes SET parts_qty = parts_qty + ?
           WHERE product_id = ? AND box_no = ? AND parts_qty <= ?"#,
    )
        .bind(qty)
        .bind(product_id)
        .bind(box_no)
        .bind(MAX_QTY - qty)
        .execute(&mut *conn)
        .await?;

    if updated.rows_affected() == 0 {
        if find_box(conn, product_id, box_no).await?.is_some() {
            return Ok(false);
        }

        let next_position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM product_boxes WHERE product_id = ?",
        )
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO product_boxes (id, product_id, box_no, parts_qty, position) VALUES (?, ?, ?, ?, ?)",
        )
            .bind(new_id())
            .bind(product_id)
            .bind(box_no)
            .bind(qty)
            .bind(next_position)
            .execute(&mut *conn)
            .await?;
    }

    touch_product(conn, product_id, Utc::now()).await?;
    Ok(true)
}

/// Conditional decrement. `false` when the box is missing or holds less than `qty`.
pub async fn take_from_box(conn: &mut SqliteConnection, box_id: &str, qty: i64) -> ApiResult<bool> {
    let updated = sqlx::query(
        "UPDATE product_boxes SET parts_qty = parts_qty - ? WHERE id = ? AND parts_qty >= ?",
    )
        .bind(qty)
        .bind(box_id)
        .bind(qty)
        .execute(&mut *conn)
        .await?;

    if updated.rows_affected() == 0 {
        return Ok(false);
    }

    let product_id: Option<String> = sqlx::query_scalar("SELECT product_id FROM product_boxes WHERE id = ?")
        .bind(box_id)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(product_id) = product_id {
        touch_product(conn, &product_id, Utc::now()).await?;
    }

    Ok(true)
}

// ==================== STOCK SUMMARY ====================

#[derive(Debug, sqlx::FromRow)]
struct StockLine {
    box_no: String,
    parts_qty: i64,
    updated_at: DateTime<Utc>,
}

/// Per sub-category totals and box details, optionally limited to one category.
pub async fn stock_summary(pool: &SqlitePool, category_id: Option<&str>) -> ApiResult<Vec<SubCategoryStock>> {
    let subs = match category_id {
        Some(cat) => {
            sqlx::query_as::<_, SubCategoryRow>(
                r#"SELECT s.* FROM sub_categories s
                   WHERE EXISTS (SELECT 1 FROM sub_category_categories sc
                                 WHERE sc.sub_category_id = s.id AND sc.category_id = ?)
                   ORDER BY s.name"#,
            )
                .bind(cat)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, SubCategoryRow>("SELECT * FROM sub_categories ORDER BY name")
                .fetch_all(pool)
                .await?
        }
    };

    let mut summary = Vec::with_capacity(subs.len());
    for sub in subs {
        let mut sql = String::from(
            r#"SELECT b.box_no, b.parts_qty, p.updated_at
               FROM product_boxes b
               JOIN products p ON p.id = b.product_id
               JOIN product_sub_categories ps ON ps.product_id = p.id
               WHERE ps.sub_category_id = ?"#,
        );
        if category_id.is_some() {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM product_categories pc WHERE pc.product_id = p.id AND pc.category_id = ?)",
            );
        }
        sql.push_str(" ORDER BY p.created_at ASC, b.position ASC");

        let mut query = sqlx::query_as::<_, StockLine>(&sql).bind(&sub.id);
        if let Some(cat) = category_id {
            query = query.bind(cat);
        }
        let lines = query.fetch_all(pool).await?;

        let detailed_boxes: Vec<DetailedBox> = lines
            .into_iter()
            .map(|line| DetailedBox {
                action: if line.parts_qty > 0 { "Add" } else { "Out" }.to_string(),
                box_no: line.box_no,
                parts_qty: line.parts_qty,
                date_added: line.updated_at,
            })
            .collect();

        summary.push(SubCategoryStock {
            id: sub.id,
            name: sub.name,
            code: sub.code,
            image: sub.image,
            total_boxes: detailed_boxes.len() as i64,
            total_parts_qty: detailed_boxes.iter().fold(0i64, |acc, b| acc.saturating_add(b.parts_qty)),
            detailed_boxes,
        });
    }

    Ok(summary)
}
