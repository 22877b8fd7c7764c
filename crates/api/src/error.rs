//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path or body.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    let (status, kind) = match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::IllegalTransition { .. } => (StatusCode::CONFLICT, "illegal_transition"),
            OrderError::WrongState { .. } => (StatusCode::CONFLICT, "wrong_state"),
            OrderError::GuardViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "guard_violation"),
            OrderError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            OrderError::PositionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        },
        DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::AlreadyExists { .. } => (StatusCode::CONFLICT, "already_exists"),
        e if e.is_version_conflict() => (StatusCode::CONFLICT, "version_conflict"),
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (status, kind, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
