// src/main.rs
use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer, Result,
};
use actix_web::http::header;
use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod handlers;
mod inventory;
mod models;
mod monitoring;
mod pagination;
pub mod repositories;
pub mod validator;
mod category_handlers;
mod camera_part_handlers;
mod product_handlers;
mod out_product_handlers;
mod damage_handlers;
mod ready_camera_handlers;
mod import_export;

use config::{load_config, Config};
use error::ApiError;
use monitoring::{Metrics, RequestLogger};

const MAX_JSON_PAYLOAD: usize = 4 * 1024 * 1024;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
}

/// Malformed bodies and query strings use the regular error envelope.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_JSON_PAYLOAD)
        .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid request body: {}", err)).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(format!("Invalid query string: {}", err)).into())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/ready", web::get().to(monitoring::readiness_check))
                .route("/metrics", web::get().to(monitoring::metrics_endpoint))
        )
        .service(
            web::scope("/api/v1")
                // Categories
                .service(
                    web::scope("/categories")
                        .route("", web::post().to(category_handlers::create_category))
                        .route("", web::get().to(category_handlers::get_categories))
                        .route("/{id}", web::get().to(category_handlers::get_category))
                        .route("/{id}", web::put().to(category_handlers::update_category))
                        .route("/{id}", web::delete().to(category_handlers::delete_category))
                )
                // Camera parts (sub-categories)
                .service(
                    web::scope("/camera-parts")
                        .route("", web::post().to(camera_part_handlers::create_camera_part))
                        .route("", web::get().to(camera_part_handlers::get_camera_parts))
                        .route("", web::put().to(camera_part_handlers::update_camera_part))
                        .route("", web::delete().to(camera_part_handlers::delete_camera_part))
                        .route("/{id}", web::get().to(camera_part_handlers::get_camera_part))
                )
                // Products
                .service(
                    web::scope("/products")
                        .route("", web::post().to(product_handlers::create_product))
                        .route("", web::get().to(product_handlers::get_products))
                        .route(
                            "/by-category-and-sub-category",
                            web::post().to(product_handlers::get_products_by_category_and_sub_category),
                        )
                        .route("/{id}", web::get().to(product_handlers::get_product))
                        .route("/{id}", web::put().to(product_handlers::update_product))
                        .route("/{id}", web::delete().to(product_handlers::delete_product))
                )
                // Withdrawals
                .service(
                    web::scope("/out-products")
                        .route("", web::post().to(out_product_handlers::create_out_product))
                        .route("", web::get().to(out_product_handlers::get_out_products))
                        .route("/export", web::get().to(import_export::export_out_products))
                )
                // Damage ledger
                .service(
                    web::scope("/damage-products")
                        .route("/add-or-out", web::post().to(damage_handlers::add_or_out))
                        .route("/all", web::get().to(damage_handlers::get_damage_products))
                        .route("/export", web::get().to(import_export::export_damage_products))
                )
                // Ready cameras
                .service(
                    web::scope("/ready-cameras")
                        .route("", web::post().to(ready_camera_handlers::create_ready_camera))
                        .route("", web::get().to(ready_camera_handlers::get_ready_cameras))
                        .route("/export", web::get().to(import_export::export_ready_cameras))
                        .route("/uids/{uid}", web::get().to(ready_camera_handlers::find_uid))
                )
                // Spreadsheet staging
                .service(
                    web::scope("/excel-uploads")
                        .route("", web::get().to(import_export::get_excel_uploads))
                        .route("/import", web::post().to(import_export::import_excel_uploads))
                        .route("/import/json", web::post().to(import_export::import_excel_uploads_json))
                        .route("/{id}/apply", web::post().to(import_export::apply_excel_upload))
                        .route("/{id}/reject", web::post().to(import_export::reject_excel_upload))
                )
                // Dashboard
                .service(
                    web::scope("/dashboard")
                        .route("/stats", web::get().to(handlers::get_dashboard_stats))
                        .route("/stock", web::get().to(handlers::get_stock_summary))
                )
        );
}

#[cfg(test)]
pub fn test_state(pool: SqlitePool) -> web::Data<Arc<AppState>> {
    web::Data::new(Arc::new(AppState {
        db_pool: pool,
        config: Config::default(),
    }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;

    if config.is_production() {
        validate_production_config(&config)?;
    }
    config.print_startup_info();

    let pool = create_database_pool(&config.database).await?;
    db::run_migrations(&pool).await.context("Failed to run migrations")?;

    let app_state = Arc::new(AppState {
        db_pool: pool.clone(),
        config: config.clone(),
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let metrics_arc = Arc::new(Metrics::new());
    let server_config = config.server.clone();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&config.security.allowed_origins, config.is_production());
        let security_headers = setup_security_headers(&config.security);

        let app = App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(metrics_arc.clone()))
            .app_data(web::PayloadConfig::new(config.security.max_request_size))
            .configure(configure_routes);

        if config.is_production() {
            let build_dir = frontend_build_dir();
            app.service(Files::new("/static", build_dir.join("static")))
                .service(Files::new("/assets", build_dir.join("assets")))
                .default_service(web::route().to(serve_index))
        } else {
            app
        }
    })
        .keep_alive(Duration::from_secs(server_config.keep_alive))
        .client_request_timeout(Duration::from_secs(server_config.client_timeout))
        .client_disconnect_timeout(Duration::from_secs(server_config.client_shutdown));

    if let Some(workers) = server_config.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::USER_AGENT,
            header::REFERER,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH, header::CONTENT_DISPOSITION])
        .max_age(3600);

    // Wildcards are refused in production by validate_production_config
    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("⚠️  Using wildcard CORS (*) in development mode");
        return cors.allow_any_origin().allow_any_header().allow_any_method();
    }

    for origin in allowed_origins.iter().filter(|o| !o.is_empty()) {
        log::debug!("Adding CORS origin: {}", origin);
        cors = cors.allowed_origin(origin);
    }
    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

fn validate_production_config(config: &Config) -> anyhow::Result<()> {
    if config.security.allowed_origins.iter().any(|o| o == "*") {
        anyhow::bail!("Wildcard CORS origins not allowed in production!");
    }
    Ok(())
}

async fn create_database_pool(db_config: &config::DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database url: {}", db_config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout))
        .idle_timeout(Duration::from_secs(db_config.idle_timeout))
        .connect_with(options)
        .await
        .context("Failed to open database")?;

    Ok(pool)
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload"
        ));
    }

    headers
}

fn frontend_build_dir() -> PathBuf {
    env::var("FRONTEND_BUILD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("..").join("camstock-admin").join("dist"))
}

async fn serve_index() -> Result<NamedFile> {
    Ok(NamedFile::open(frontend_build_dir().join("index.html"))?)
}
