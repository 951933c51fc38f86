//! API error handling.
//!
//! Every error leaves the service as `{code, message, details?}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Per-field validation failures, when there are any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn missing_signature() -> Self {
        Self::unauthorized("MISSING_SIGNATURE", "X-Signature header is required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 400, matching how the webhook payload validation reports.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "DOWNSTREAM_FAILURE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::SignatureInvalid => {
                ApiError::unauthorized("INVALID_SIGNATURE", "Invalid webhook signature")
            }
            Error::PayloadMalformed { message, details } => {
                let api = ApiError::validation(message);
                match serde_json::to_value(&details) {
                    Ok(details) => api.with_details(details),
                    Err(_) => api,
                }
            }
            Error::CircuitOpen { service } => {
                ApiError::service_unavailable(format!("Circuit breaker is open for {service}"))
            }
            e @ (Error::DownstreamFailure { .. } | Error::DeliveryExhausted { .. }) => {
                tracing::warn!(error = %e, "Downstream failure surfaced to caller");
                ApiError::bad_gateway(e.to_string())
            }
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{entity_type} with id '{id}' not found"))
            }
            Error::Forbidden { entity_type, id } => {
                ApiError::forbidden(format!("{entity_type} {id} belongs to another user"))
            }
            Error::Validation(msg) => ApiError::validation(msg),
            Error::Configuration(msg) => ApiError::bad_request(msg),
            Error::DatabaseSqlx(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::internal("Database error occurred")
            }
            Error::Io(e) => {
                tracing::error!("IO error: {}", e);
                ApiError::internal("IO error occurred")
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::SignatureInvalid, StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
            (
                Error::CircuitOpen {
                    service: "webhook-notify".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
            (
                Error::downstream(Some(500), "boom"),
                StatusCode::BAD_GATEWAY,
                "DOWNSTREAM_FAILURE",
            ),
            (
                Error::DeliveryExhausted {
                    attempts: 5,
                    last_error: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
                "DOWNSTREAM_FAILURE",
            ),
            (Error::not_found("Notification", 3), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (Error::forbidden("Notification", 3), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (Error::validation("bad"), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (Error::config("bad"), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (
                Error::Other("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_malformed_payload_carries_details() {
        let err = Error::malformed(
            "Invalid request payload",
            vec![FieldError::new("userId", "userId is required")],
        );
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, "VALIDATION_ERROR");
        assert_eq!(
            api.details,
            Some(serde_json::json!([{"field": "userId", "message": "userId is required"}]))
        );
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let api: ApiError = Error::Other("secret detail".into()).into();
        assert!(!api.message.contains("secret"));
    }
}
