//! Shared API types
//!
//! Error responses for requests that never reach the file service, and the
//! envelope responder that picks an HTTP status for an [`OperationResult`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::data::files::{FailureKind, OperationResult};

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

/// HTTP status for an operation outcome
pub fn envelope_status<T>(result: &OperationResult<T>) -> StatusCode {
    if result.success {
        return StatusCode::OK;
    }
    match result.kind {
        Some(FailureKind::NotFound) => StatusCode::NOT_FOUND,
        Some(FailureKind::Conflict) => StatusCode::CONFLICT,
        Some(FailureKind::InvalidInput) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
        _ if result.retryable => StatusCode::SERVICE_UNAVAILABLE,
        Some(FailureKind::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serializes the envelope with the matching status
pub struct Envelope<T>(pub OperationResult<T>);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (envelope_status(&self.0), Json(self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::storage::StorageError;

    #[test]
    fn test_success_is_ok() {
        assert_eq!(envelope_status(&OperationResult::ok(1)), StatusCode::OK);
        let warned = OperationResult::ok(1).with_warnings(vec!["slow".to_string()]);
        assert_eq!(envelope_status(&warned), StatusCode::OK);
    }

    #[test]
    fn test_failure_kinds_map_to_statuses() {
        let cases = [
            (FailureKind::NotFound, StatusCode::NOT_FOUND),
            (FailureKind::Conflict, StatusCode::CONFLICT),
            (FailureKind::InvalidInput, StatusCode::BAD_REQUEST),
            (FailureKind::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (FailureKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            let result = OperationResult::<()>::failure(kind, "failed");
            assert_eq!(envelope_status(&result), status, "{:?}", kind);
        }
    }

    #[test]
    fn test_retryable_storage_errors_are_unavailable() {
        let err = StorageError::VerificationTimeout {
            operation: "delete",
            path: "a.txt".to_string(),
        };
        let result = OperationResult::<()>::from_error(&err);
        assert_eq!(envelope_status(&result), StatusCode::SERVICE_UNAVAILABLE);

        let err = StorageError::Configuration("no pull zone".to_string());
        let result = OperationResult::<()>::from_error(&err);
        assert_eq!(envelope_status(&result), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_api_error_body_shape() {
        let response = ApiError::bad_request("INVALID_CONTENT_TYPE", "bad header").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["code"], "INVALID_CONTENT_TYPE");
        assert_eq!(body["message"], "bad header");
    }
}
