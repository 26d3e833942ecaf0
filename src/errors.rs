use actix_web::{error::ResponseError, http::StatusCode, web, HttpRequest, HttpResponse, Route};
use log::{debug, error, warn};
use serde_json::json;
use thiserror::Error;

// Custom error handling
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Database(msg) => {
                error!("\x1B[1;31mDATABASE ERROR:\x1B[0m {}", msg);
                HttpResponse::InternalServerError().json(json!({ "error": msg }))
            }
            ApiError::Validation(msg) => {
                warn!("\x1B[1;33mVALIDATION ERROR:\x1B[0m {}", msg);
                HttpResponse::BadRequest().json(json!({ "error": msg }))
            }
            // Auth failures keep the portal scripts' response contract:
            // a success flag plus a message.
            ApiError::Auth(msg) => {
                warn!("\x1B[1;33mAUTHENTICATION ERROR:\x1B[0m {}", msg);
                HttpResponse::Unauthorized().json(json!({ "success": false, "message": msg }))
            }
            ApiError::Forbidden(msg) => {
                warn!("\x1B[1;33mACCESS DENIED:\x1B[0m {}", msg);
                HttpResponse::Forbidden().json(json!({ "success": false, "message": msg }))
            }
            ApiError::NotFound(msg) => {
                debug!("\x1B[1;36mNOT FOUND:\x1B[0m {}", msg);
                HttpResponse::NotFound().json(json!({ "error": msg }))
            }
            ApiError::Internal(msg) => {
                error!("\x1B[1;31mINTERNAL SERVER ERROR:\x1B[0m {}", msg);
                HttpResponse::InternalServerError().json(json!({ "error": msg }))
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Per-resource fallback: the path exists but the method does not.
pub fn method_not_allowed(allowed: &'static str) -> Route {
    web::route().to(move |req: HttpRequest| async move {
        HttpResponse::MethodNotAllowed().json(json!({
            "success": false,
            "message": format!(
                "Method {} is not supported for this endpoint. Supported methods: [{}]",
                req.method(),
                allowed
            ),
        }))
    })
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "Resource not found" }))
}
