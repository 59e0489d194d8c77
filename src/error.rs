use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use tracing as _;

/// Structured validation errors with field-level error mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationErrors {
    Single { field: String, message: String },
    Multiple { fields: HashMap<String, String> },
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationErrors::Single { field, message } => write!(f, "{}: {}", field, message),
            ValidationErrors::Multiple { fields } => {
                let errors: Vec<String> = fields
                    .iter()
                    .map(|(field, message)| format!("{}: {}", field, message))
                    .collect();
                write!(f, "Validation errors: {}", errors.join(", "))
            }
        }
    }
}

/// The error taxonomy shared by every component. Every external-interface
/// handler converts this into an HTTP response via `IntoResponse`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// True uniqueness collision not covered by an idempotency key (§7).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// An async backend (LLM/embedding/OCR/calendar/WhatsApp) failed and the
    /// caller is a synchronous endpoint, not a scheduled job.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A per-tenant circuit breaker is open for this backend.
    #[error("Circuit breaker open for workspace {0}")]
    CircuitOpen(uuid::Uuid),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn create_error_body(msg: String, code: &str) -> serde_json::Value {
    serde_json::json!({ "error": msg, "code": code })
}

fn log_error(error: &Error, error_code: &str, status_code: u16) {
    if status_code >= 500 {
        tracing::error!(error_code, error = %error, status_code, "error returned to client");
    } else {
        tracing::warn!(error_code, error = %error, status_code, "error returned to client");
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        log_error(&self, self.error_code(), self.status_code());

        let request_id = uuid::Uuid::now_v7();

        let (mut body, status) = match self {
            Error::Validation(errors) => {
                let body = match errors {
                    ValidationErrors::Single { field, message } => serde_json::json!({
                        "error": "Validation failed",
                        "code": "VALIDATION_ERROR",
                        "fields": { field: message }
                    }),
                    ValidationErrors::Multiple { fields } => serde_json::json!({
                        "error": "Validation failed",
                        "code": "VALIDATION_ERROR",
                        "fields": fields
                    }),
                };
                (body, StatusCode::UNPROCESSABLE_ENTITY)
            }
            Error::NotFound(msg) => (create_error_body(msg, "NOT_FOUND"), StatusCode::NOT_FOUND),
            Error::Auth(msg) => (
                create_error_body(msg, "AUTH_FAILED"),
                StatusCode::UNAUTHORIZED,
            ),
            Error::Forbidden(msg) => (create_error_body(msg, "FORBIDDEN"), StatusCode::FORBIDDEN),
            Error::Conflict(msg) => (create_error_body(msg, "CONFLICT"), StatusCode::CONFLICT),
            Error::RateLimited { retry_after_ms } => (
                serde_json::json!({
                    "error": "rate limited",
                    "code": "RATE_LIMITED",
                    "retry_after_ms": retry_after_ms,
                }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            Error::UpstreamUnavailable(msg) => (
                create_error_body(msg, "UPSTREAM_UNAVAILABLE"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            Error::CircuitOpen(ws) => (
                create_error_body(format!("circuit open for {ws}"), "CIRCUIT_OPEN"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            Error::PayloadTooLarge(n) => (
                create_error_body(format!("payload too large: {n} bytes"), "PAYLOAD_TOO_LARGE"),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            Error::Sqlx(_) => (
                create_error_body("database error".to_string(), "INTERNAL_ERROR"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Error::Redis(_) => (
                create_error_body("ephemeral store error".to_string(), "INTERNAL_ERROR"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Error::Internal(_) => (
                create_error_body("internal error".to_string(), "INTERNAL_ERROR"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Error::Config(_) => (
                create_error_body("configuration error".to_string(), "CONFIG_ERROR"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Error::Cache(msg) => (
                create_error_body(msg, "CACHE_ERROR"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Error::Io(_) => (
                create_error_body("IO error".to_string(), "INTERNAL_ERROR"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Error::Json(e) => (
                create_error_body(format!("invalid JSON payload: {e}"), "VALIDATION_ERROR"),
                StatusCode::BAD_REQUEST,
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("request_id".to_string(), serde_json::json!(request_id));
            }
        }

        (status, Json(body)).into_response()
    }
}

impl Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::Auth(_) => 401,
            Error::Forbidden(_) => 403,
            Error::Conflict(_) => 409,
            Error::RateLimited { .. } => 429,
            Error::UpstreamUnavailable(_) => 503,
            Error::CircuitOpen(_) => 503,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Auth(_) => "AUTH_FAILED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::Conflict(_) => "CONFLICT",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Error::CircuitOpen(_) => "CIRCUIT_OPEN",
            Error::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Error::Sqlx(_) => "INTERNAL_ERROR",
            Error::Redis(_) => "INTERNAL_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Cache(_) => "CACHE_ERROR",
            Error::Io(_) => "INTERNAL_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
