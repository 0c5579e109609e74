// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::router::RouterError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Translate the routing taxonomy into transport-level responses. Client
// mistakes map to 4xx, infrastructure faults to 503, tenant misconfiguration
// to 500 (retrying will not help until the record is fixed).
impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::MissingIdentifier => {
                ApiError::bad_request("Missing institute identifier")
            }
            RouterError::TenantNotFound(code) => {
                ApiError::not_found(format!("Institute not found: {}", code))
            }
            RouterError::StoreUnavailable(reason) => {
                tracing::error!("Institute registry unavailable: {}", reason);
                ApiError::service_unavailable("Institute registry temporarily unavailable")
            }
            RouterError::ConnectionUnreachable { db_name, reason } => {
                tracing::error!("Database {} unreachable: {}", db_name, reason);
                ApiError::service_unavailable("Tenant database temporarily unavailable")
            }
            RouterError::MissingConnectionTemplate(code) => {
                tracing::error!("Institute {} has no usable connection template", code);
                ApiError::internal_server_error("Institute is misconfigured")
            }
            RouterError::DatabaseEmptyOrUninitialized(db_name) => {
                tracing::error!("Database {} is empty or uninitialized", db_name);
                ApiError::internal_server_error("Institute database is not provisioned")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_router_errors_to_caller_remedies() {
        assert_eq!(ApiError::from(RouterError::MissingIdentifier).status_code(), 400);
        assert_eq!(
            ApiError::from(RouterError::TenantNotFound("ABC".into())).status_code(),
            404
        );
        assert_eq!(
            ApiError::from(RouterError::StoreUnavailable("down".into())).status_code(),
            503
        );
        assert_eq!(
            ApiError::from(RouterError::ConnectionUnreachable {
                db_name: "abc_db".into(),
                reason: "refused".into()
            })
            .status_code(),
            503
        );
        assert_eq!(
            ApiError::from(RouterError::MissingConnectionTemplate("ABC".into())).status_code(),
            500
        );
        assert_eq!(
            ApiError::from(RouterError::DatabaseEmptyOrUninitialized("abc_db".into()))
                .status_code(),
            500
        );
    }

    #[test]
    fn json_body_carries_code_and_message() {
        let body = ApiError::from(RouterError::MissingIdentifier).to_json();
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}
