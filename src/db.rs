// src/db.rs - Database migrations and setup

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Categories
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 255),
            description TEXT NOT NULL DEFAULT '' CHECK(length(description) <= 1000),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Sub-categories (camera parts)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sub_categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK(length(name) > 0 AND length(name) <= 255),
            code TEXT NOT NULL CHECK(length(code) > 0 AND length(code) <= 100),
            image TEXT NOT NULL CHECK(length(image) > 0),
            parts_per_camera INTEGER NOT NULL DEFAULT 1 CHECK(parts_per_camera >= 1),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sub_category_categories (
            sub_category_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (sub_category_id, category_id),
            FOREIGN KEY (sub_category_id) REFERENCES sub_categories (id) ON DELETE CASCADE,
            FOREIGN KEY (category_id) REFERENCES categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Products with their boxes
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL DEFAULT '',
            more_details TEXT NOT NULL DEFAULT '{}',
            publish INTEGER NOT NULL DEFAULT 1 CHECK(publish IN (0, 1)),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_categories (
            product_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (product_id, category_id),
            FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE,
            FOREIGN KEY (category_id) REFERENCES categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_sub_categories (
            product_id TEXT NOT NULL,
            sub_category_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (product_id, sub_category_id),
            FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE,
            FOREIGN KEY (sub_category_id) REFERENCES sub_categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // parts_qty stays a whole number in 0..=MAX_QTY
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_boxes (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            box_no TEXT NOT NULL CHECK(length(box_no) > 0 AND length(box_no) <= 100),
            parts_qty INTEGER NOT NULL
                CHECK(typeof(parts_qty) = 'integer' AND parts_qty >= 0 AND parts_qty <= 1000000000),
            position INTEGER NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE,
            UNIQUE(product_id, box_no)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Withdrawals. box_id is not a foreign key so history outlives deleted products.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS out_products (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            sub_category_id TEXT NOT NULL,
            box_id TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK(quantity > 0),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories (id),
            FOREIGN KEY (sub_category_id) REFERENCES sub_categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Damaged goods ledger
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS damage_products (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            sub_category_id TEXT NOT NULL,
            box_no TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK(quantity > 0),
            action TEXT NOT NULL CHECK(action IN ('Add', 'Out')),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories (id),
            FOREIGN KEY (sub_category_id) REFERENCES sub_categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Ready cameras
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ready_cameras (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ready_camera_boxes (
            id TEXT PRIMARY KEY,
            ready_camera_id TEXT NOT NULL,
            box_no TEXT NOT NULL CHECK(length(box_no) > 0),
            position INTEGER NOT NULL,
            FOREIGN KEY (ready_camera_id) REFERENCES ready_cameras (id) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    // uid is the primary key: a part can be assembled only once
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ready_camera_part_uids (
            uid TEXT PRIMARY KEY,
            ready_camera_box_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            FOREIGN KEY (ready_camera_box_id) REFERENCES ready_camera_boxes (id) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Staged spreadsheet rows
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS excel_uploads (
            id TEXT PRIMARY KEY,
            parts_name TEXT NOT NULL CHECK(length(parts_name) > 0),
            parts_code TEXT NOT NULL CHECK(length(parts_code) > 0),
            box_no TEXT NOT NULL CHECK(length(box_no) > 0),
            qty INTEGER NOT NULL CHECK(qty > 0),
            category_id TEXT NOT NULL,
            sub_category_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Pending' CHECK(status IN ('Pending', 'Applied', 'Rejected')),
            remark TEXT NOT NULL DEFAULT '',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories (id),
            FOREIGN KEY (sub_category_id) REFERENCES sub_categories (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    create_indexes(pool).await?;

    log::info!("Database migrations completed");
    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_categories_created_at ON categories(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_sub_categories_created_at ON sub_categories(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_sub_category_categories_category ON sub_category_categories(category_id)",
        "CREATE INDEX IF NOT EXISTS idx_product_categories_category ON product_categories(category_id)",
        "CREATE INDEX IF NOT EXISTS idx_product_sub_categories_sub ON product_sub_categories(sub_category_id)",
        "CREATE INDEX IF NOT EXISTS idx_product_boxes_product ON product_boxes(product_id, position)",
        "CREATE INDEX IF NOT EXISTS idx_out_products_created_at ON out_products(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_out_products_box ON out_products(box_id)",
        "CREATE INDEX IF NOT EXISTS idx_damage_products_created_at ON damage_products(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_ready_cameras_created_at ON ready_cameras(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_ready_camera_boxes_camera ON ready_camera_boxes(ready_camera_id, position)",
        "CREATE INDEX IF NOT EXISTS idx_ready_camera_part_uids_box ON ready_camera_part_uids(ready_camera_box_id, position)",
        "CREATE INDEX IF NOT EXISTS idx_excel_uploads_status ON excel_uploads(status)",
    ];

    for sql in indexes {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?"
    )
        .bind(table)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Single-connection in-memory database with migrations applied.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}

/// File-backed pool with several connections, for tests that need real concurrency
#[cfg(test)]
pub async fn file_pool(dir: &std::path::Path, max_connections: u32) -> SqlitePool {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let options = SqliteConnectOptions::new()
        .filename(dir.join("camstock-test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("file sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}

/// Seed helpers for database-backed tests
#[cfg(test)]
pub mod fixtures {
    use chrono::Utc;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    pub async fn category(pool: &SqlitePool, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query("INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, '', ?, ?)")
            .bind(&id).bind(name).bind(now).bind(now)
            .execute(pool).await.unwrap();
        id
    }

    pub async fn sub_category(pool: &SqlitePool, name: &str, categories: &[&str]) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sub_categories (id, name, code, image, parts_per_camera, created_at, updated_at) \
             VALUES (?, ?, ?, 'img.png', 1, ?, ?)"
        )
            .bind(&id).bind(name).bind(format!("{}-CODE", name)).bind(now).bind(now)
            .execute(pool).await.unwrap();
        for (pos, cat) in categories.iter().enumerate() {
            sqlx::query("INSERT INTO sub_category_categories (sub_category_id, category_id, position) VALUES (?, ?, ?)")
                .bind(&id).bind(*cat).bind(pos as i64)
                .execute(pool).await.unwrap();
        }
        id
    }

    pub async fn product(pool: &SqlitePool, category: &str, sub_category: &str, boxes: &[(&str, i64)]) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query("INSERT INTO products (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(&id).bind(now).bind(now)
            .execute(pool).await.unwrap();
        sqlx::query("INSERT INTO product_categories (product_id, category_id, position) VALUES (?, ?, 0)")
            .bind(&id).bind(category)
            .execute(pool).await.unwrap();
        sqlx::query("INSERT INTO product_sub_categories (product_id, sub_category_id, position) VALUES (?, ?, 0)")
            .bind(&id).bind(sub_category)
            .execute(pool).await.unwrap();
        for (pos, (box_no, qty)) in boxes.iter().enumerate() {
            sqlx::query("INSERT INTO product_boxes (id, product_id, box_no, parts_qty, position) VALUES (?, ?, ?, ?, ?)")
                .bind(Uuid::new_v4().to_string()).bind(&id).bind(*box_no).bind(*qty).bind(pos as i64)
                .execute(pool).await.unwrap();
        }
        id
    }

    pub async fn box_id(pool: &SqlitePool, product_id: &str, box_no: &str) -> String {
        sqlx::query_scalar("SELECT id FROM product_boxes WHERE product_id = ? AND box_no = ?")
            .bind(product_id).bind(box_no)
            .fetch_one(pool).await.unwrap()
    }

    pub async fn box_qty(pool: &SqlitePool, product_id: &str, box_no: &str) -> Option<i64> {
        sqlx::query_scalar("SELECT parts_qty FROM product_boxes WHERE product_id = ? AND box_no = ?")
            .bind(product_id).bind(box_no)
            .fetch_optional(pool).await.unwrap()
    }
}
