// src/repositories/mod.rs
//! Repositories for the reference data (categories, camera parts)

mod camera_part_repository;
mod category_repository;

pub use camera_part_repository::{CameraPartRepository, NewCameraPart};
pub use category_repository::CategoryRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use serde::Serialize;
use crate::error::{ApiError, ApiResult};

/// Base trait for CRUD operations
#[async_trait]
pub trait CrudRepository<T, CreateDto, UpdateDto>: Send + Sync
where
    T: Serialize + Send + Unpin + for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow>,
    CreateDto: Send,
    UpdateDto: Send,
{
    /// Table name in the database
    fn table_name(&self) -> &'static str;

    /// Name used in "<entity> not found" messages
    fn entity_name(&self) -> &'static str;

    /// Default sort field, newest first
    fn default_sort_field(&self) -> &'static str {
        "created_at"
    }

    async fn create(&self, pool: &SqlitePool, data: CreateDto) -> ApiResult<T>;

    async fn get_by_id(&self, pool: &SqlitePool, id: &str) -> ApiResult<Option<T>> {
        let query = format!("SELECT * FROM {} WHERE id = ?", self.table_name());

        let result = sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result)
    }

    /// Like `get_by_id`, with a 404 when the record is absent
    async fn require(&self, pool: &SqlitePool, id: &str) -> ApiResult<T> {
        self.get_by_id(pool, id)
            .await?
            .ok_or_else(|| ApiError::not_found(self.entity_name()))
    }

    async fn list(&self, pool: &SqlitePool) -> ApiResult<Vec<T>> {
        let query = format!(
            "SELECT * FROM {} ORDER BY {} DESC, rowid DESC",
            self.table_name(),
            self.default_sort_field()
        );

        let rows = sqlx::query_as::<_, T>(&query).fetch_all(pool).await?;
        Ok(rows)
    }

    async fn update(&self, pool: &SqlitePool, id: &str, data: UpdateDto) -> ApiResult<T>;

    async fn delete(&self, pool: &SqlitePool, id: &str) -> ApiResult<()> {
        let query = format!("DELETE FROM {} WHERE id = ?", self.table_name());

        let result = sqlx::query(&query)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(self.entity_name()));
        }

        Ok(())
    }
}

/// Ids from `ids` that have no row in `table`
pub async fn missing_ids(pool: &SqlitePool, table: &str, ids: &[String]) -> ApiResult<Vec<String>> {
    let query = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    let mut missing = Vec::new();

    for id in ids {
        let count: i64 = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_one(pool)
            .await?;
        if count == 0 {
            missing.push(id.clone());
        }
    }

    Ok(missing)
}
