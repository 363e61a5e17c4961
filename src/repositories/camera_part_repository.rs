// src/repositories/camera_part_repository.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::handlers::new_id;
use crate::models::{CameraPart, NamedRef, SubCategoryRow, UpdateCameraPartRequest};

/// Checked input for a new camera part
#[derive(Debug, Clone)]
pub struct NewCameraPart {
    pub name: String,
    pub code: String,
    pub image: String,
    pub categories: Vec<String>,
    pub parts_per_camera: i64,
}

pub struct CameraPartRepository;

impl CameraPartRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn categories_of(&self, pool: &SqlitePool, id: &str) -> ApiResult<Vec<NamedRef>> {
        let refs = sqlx::query_as::<_, NamedRef>(
            r#"SELECT c.id, c.name
               FROM sub_category_categories sc
               JOIN categories c ON c.id = sc.category_id
               WHERE sc.sub_category_id = ?
               ORDER BY sc.position"#,
        )
            .bind(id)
            .fetch_all(pool)
            .await?;
        Ok(refs)
    }

    pub async fn populate(&self, pool: &SqlitePool, row: SubCategoryRow) -> ApiResult<CameraPart> {
        let category = self.categories_of(pool, &row.id).await?;
        Ok(CameraPart::from_row(row, category))
    }

    /// Newest first, optionally only those linked to `category_id`
    pub async fn list_populated(&self, pool: &SqlitePool, category_id: Option<&str>) -> ApiResult<Vec<CameraPart>> {
        let rows = match category_id {
            Some(cat) => {
                sqlx::query_as::<_, SubCategoryRow>(
                    r#"SELECT s.* FROM sub_categories s
                       WHERE EXISTS (SELECT 1 FROM sub_category_categories sc
                                     WHERE sc.sub_category_id = s.id AND sc.category_id = ?)
                       ORDER BY s.created_at DESC, s.rowid DESC"#,
                )
                    .bind(cat)
                    .fetch_all(pool)
                    .await?
            }
            None => self.list(pool).await?,
        };

        let mut parts = Vec::with_capacity(rows.len());
        for row in rows {
            parts.push(self.populate(pool, row).await?);
        }
        Ok(parts)
    }

    pub async fn is_referenced(&self, pool: &SqlitePool, id: &str) -> ApiResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT (SELECT COUNT(*) FROM product_sub_categories WHERE sub_category_id = ?)
                    + (SELECT COUNT(*) FROM out_products WHERE sub_category_id = ?)
                    + (SELECT COUNT(*) FROM damage_products WHERE sub_category_id = ?)
                    + (SELECT COUNT(*) FROM excel_uploads WHERE sub_category_id = ?)"#,
        )
            .bind(id)
            .bind(id)
            .bind(id)
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    async fn link_categories(conn: &mut SqliteConnection, id: &str, categories: &[String]) -> ApiResult<()> {
        sqlx::query("DELETE FROM sub_category_categories WHERE sub_category_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let mut seen: Vec<&str> = Vec::new();
        for category in categories {
            if seen.contains(&category.as_str()) {
                continue;
            }
            sqlx::query(
                "INSERT INTO sub_category_categories (sub_category_id, category_id, position) VALUES (?, ?, ?)",
            )
                .bind(id)
                .bind(category)
                .bind(seen.len() as i64)
                .execute(&mut *conn)
                .await?;
            seen.push(category);
        }
        Ok(())
    }
}

#[async_trait]
impl CrudRepository<SubCategoryRow, NewCameraPart, UpdateCameraPartRequest> for CameraPartRepository {
    fn table_name(&self) -> &'static str {
        "sub_categories"
    }

    fn entity_name(&self) -> &'static str {
        "Camera part"
    }

    async fn create(&self, pool: &SqlitePool, data: NewCameraPart) -> ApiResult<SubCategoryRow> {
        let id = new_id();
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO sub_categories (id, name, code, image, parts_per_camera, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
            .bind(&id)
            .bind(&data.name)
            .bind(&data.code)
            .bind(&data.image)
            .bind(data.parts_per_camera)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        Self::link_categories(&mut tx, &id, &data.categories).await?;
        tx.commit().await?;

        self.require(pool, &id).await
    }

    async fn update(&self, pool: &SqlitePool, id: &str, data: UpdateCameraPartRequest) -> ApiResult<SubCategoryRow> {
        let existing = self.get_by_id(pool, id).await?.ok_or_else(ApiError::check_your_id)?;

        let trimmed = |v: Option<String>, current: String| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).unwrap_or(current)
        };
        let name = trimmed(data.name, existing.name);
        let code = trimmed(data.code, existing.code);
        let image = trimmed(data.image, existing.image);
        let parts_per_camera = data.parts_per_camera.unwrap_or(existing.parts_per_camera);

        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"UPDATE sub_categories
               SET name = ?, code = ?, image = ?, parts_per_camera = ?, updated_at = ?
               WHERE id = ?"#,
        )
            .bind(&name)
            .bind(&code)
            .bind(&image)
            .bind(parts_per_camera)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(categories) = data.category.as_deref() {
            Self::link_categories(&mut tx, id, categories).await?;
        }
        tx.commit().await?;

        self.require(pool, id).await
    }
}
