use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these,
// never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const RULE_VIOLATION: &str = "RULE_VIOLATION";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const INTERNAL: &str = "INTERNAL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

/// Message shown to clients for storage and internal faults.
/// The real cause goes to the log only.
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal error";

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type used at the HTTP boundary.
///
/// Each variant maps to a stable error code (see [`error_code`]) and an
/// HTTP status code. The JSON response always includes both:
///
/// ```json
/// {"code": "ALREADY_EXISTS", "message": "You are already enrolled in this course"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Conflicts with existing state (duplicate key, already enrolled). HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Input data is malformed or missing. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Input is well-formed but breaks a domain rule. HTTP 422.
    #[error("{0}")]
    Rule(String),

    /// Missing session or bad credentials. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to act on the resource. HTTP 403.
    #[error("{0}")]
    PermissionDenied(String),

    /// Storage backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Rule(_) => error_code::RULE_VIOLATION,
            ServiceError::Unauthorized(_) => error_code::UNAUTHENTICATED,
            ServiceError::PermissionDenied(_) => error_code::PERMISSION_DENIED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Rule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the end user.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Storage(_) | ServiceError::Internal(_) => {
                GENERIC_INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if matches!(self, ServiceError::Storage(_) | ServiceError::Internal(_)) {
            tracing::error!(code = self.error_code(), "request failed: {}", self);
        }
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.public_message(),
        });
        (status, axum::Json(body)).into_response()
    }
}
