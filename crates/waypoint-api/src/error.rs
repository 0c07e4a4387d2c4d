//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps service errors to HTTP status codes and JSON error bodies with an
//! error code, message, and optional details. Internal and storage details
//! are logged, never returned to clients.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::service::ServiceError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Connection pool saturated (503 with `Retry-After`).
    #[error("resource exhausted; retry after {retry_after:?}")]
    ResourceExhausted { retry_after: Duration },

    /// Storage engine unreachable (503). Message is logged only.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The request deadline elapsed (504).
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Internal server error (500). Message is logged only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::ResourceExhausted { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "RESOURCE_EXHAUSTED")
            }
            Self::StorageUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
            }
            Self::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Client-facing message. Server-side faults get a fixed text.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::StorageUnavailable(_) => {
                "The service is temporarily unavailable; retry later".to_string()
            }
            Self::ResourceExhausted { .. } => {
                "The service is busy; retry after the indicated delay".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// `Retry-After` in whole seconds, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.public_message();

        match &self {
            Self::Internal(_) | Self::StorageUnavailable(_) => {
                tracing::error!(error = %self, code, "server error");
            }
            Self::ResourceExhausted { .. } | Self::DeadlineExceeded => {
                tracing::warn!(error = %self, code, "request shed");
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::ResourceExhausted { retry_after } = self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => Self::NotFound(msg),
            ServiceError::Conflict(msg) => Self::Conflict(msg),
            ServiceError::Validation(msg) => Self::Validation(msg),
            ServiceError::ResourceExhausted { retry_after } => {
                Self::ResourceExhausted { retry_after }
            }
            ServiceError::StorageUnavailable(msg) => Self::StorageUnavailable(msg),
            ServiceError::DeadlineExceeded => Self::DeadlineExceeded,
            ServiceError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<waypoint_core::ValidationError> for AppError {
    fn from(err: waypoint_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
