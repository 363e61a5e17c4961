// src/repositories/category_repository.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use super::CrudRepository;
use crate::error::{ApiError, ApiResult};
use crate::handlers::new_id;
use crate::models::{Category, CreateCategoryRequest, UpdateCategoryRequest};

pub struct CategoryRepository;

impl CategoryRepository {
    pub fn new() -> Self {
        Self
    }

    /// Names of the tables that still point at the category
    pub async fn references(&self, pool: &SqlitePool, id: &str) -> ApiResult<Vec<&'static str>> {
        let checks = [
            ("camera parts", "SELECT COUNT(*) FROM sub_category_categories WHERE category_id = ?"),
            ("products", "SELECT COUNT(*) FROM product_categories WHERE category_id = ?"),
            ("out products", "SELECT COUNT(*) FROM out_products WHERE category_id = ?"),
            ("damage products", "SELECT COUNT(*) FROM damage_products WHERE category_id = ?"),
            ("ready cameras", "SELECT COUNT(*) FROM ready_cameras WHERE category_id = ?"),
            ("excel uploads", "SELECT COUNT(*) FROM excel_uploads WHERE category_id = ?"),
        ];

        let mut found = Vec::new();
        for (label, sql) in checks {
            let count: i64 = sqlx::query_scalar(sql).bind(id).fetch_one(pool).await?;
            if count > 0 {
                found.push(label);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl CrudRepository<Category, CreateCategoryRequest, UpdateCategoryRequest> for CategoryRepository {
    fn table_name(&self) -> &'static str {
        "categories"
    }

    fn entity_name(&self) -> &'static str {
        "Category"
    }

    async fn create(&self, pool: &SqlitePool, data: CreateCategoryRequest) -> ApiResult<Category> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Category name is required"));
        }

        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
            .bind(&id)
            .bind(name)
            .bind(data.description.as_deref().map(str::trim).unwrap_or(""))
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;

        self.require(pool, &id).await
    }

    async fn update(&self, pool: &SqlitePool, id: &str, data: UpdateCategoryRequest) -> ApiResult<Category> {
        let existing = self.get_by_id(pool, id).await?.ok_or_else(ApiError::check_your_id)?;

        let name = match data.name.as_deref().map(str::trim) {
            Some("") => return Err(ApiError::bad_request("Category name is required")),
            Some(name) => name.to_string(),
            None => existing.name,
        };
        let description = data
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or(existing.description);

        sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(&description)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;

        self.require(pool, id).await
    }
}
