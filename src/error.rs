// src/error.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body. Same envelope as `ApiResponse`, with `error: true`.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "{}", msg),
            ApiError::NotFound(msg) => write!(f, "{}", msg),
            ApiError::Conflict(msg) => write!(f, "{}", msg),
            ApiError::InternalServerError(msg) => write!(f, "{}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            error: true,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(e) => {
                log::error!("Database error: {}", e);
                HttpResponse::InternalServerError().json(error_response)
            }
            ApiError::InternalServerError(msg) => {
                log::error!("Internal error: {}", msg);
                HttpResponse::InternalServerError().json(error_response)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return ApiError::Conflict(format!("Duplicate value: {}", db_err.message()));
            }
        }
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::InternalServerError(format!("CSV error: {}", err))
    }
}

// Domain errors
impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{} not found", entity))
    }

    pub fn invalid_id(field: &str) -> Self {
        ApiError::BadRequest(format!("Invalid {} ID", field))
    }

    pub fn check_your_id() -> Self {
        ApiError::BadRequest("Check your _id".to_string())
    }

    pub fn insufficient_quantity(available: i64, requested: i64) -> Self {
        ApiError::BadRequest(format!(
            "Insufficient quantity. Available: {}, Requested: {}",
            available, requested
        ))
    }

    pub fn still_referenced(entity: &str, by: &str) -> Self {
        ApiError::BadRequest(format!("{} is still referenced by {}", entity, by))
    }
}
