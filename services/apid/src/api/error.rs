//! API error type and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint reports
//! failures the same way: the error's message as plain text with the mapped
//! status code.
//!
//! # Key invariants
//! - Authorization failures never carry resource details.
//! - Internal errors are logged server-side with their full cause.
use crate::controller::ControllerError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Error returned by handlers; renders as a `text/plain` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    ApiError {
        status,
        message: message.into(),
    }
}

/// Missing or invalid credentials.
pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, message)
}

/// Authenticated caller lacks the required capability.
pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, message)
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

pub fn api_method_not_allowed() -> ApiError {
    api_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

/// Log a store failure and build a 500 carrying its message.
pub fn api_internal(err: &StoreError) -> ApiError {
    match err {
        StoreError::Cancelled => tracing::warn!("request cancelled during store operation"),
        StoreError::Unexpected(cause) => tracing::error!(error = ?cause, "apid storage error"),
    }
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub fn api_unavailable(err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "store health check failed");
    api_error(StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
}

impl From<ControllerError> for ApiError {
    fn from(err: ControllerError) -> Self {
        match &err {
            ControllerError::Unauthorized => api_forbidden(&err.to_string()),
            ControllerError::NotFound => api_not_found(&err.to_string()),
            ControllerError::Validation(inner) => api_validation_error(&inner.to_string()),
            ControllerError::Store(inner) => api_internal(inner),
            ControllerError::Serialization(inner) => {
                tracing::error!(error = %inner, "failed to serialize response");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}
