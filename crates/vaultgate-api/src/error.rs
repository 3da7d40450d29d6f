//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every domain failure carries a [`FailureKind`]; the kind picks the HTTP
//! status and the machine-readable code. Messages of 500-class errors are
//! never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use vaultgate_access::AccessError;
use vaultgate_core::FailureKind;
use vaultgate_gate::GateError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "ACCESS_DENIED", "TIMEOUT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Remediation hint for transient failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A classified domain failure.
    #[error("{message}")]
    Domain {
        /// Failure category.
        kind: FailureKind,
        /// Description.
        message: String,
    },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

/// HTTP status for a failure kind.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Unauthorized | FailureKind::InvalidCredential => StatusCode::UNAUTHORIZED,
        FailureKind::AccessDenied => StatusCode::FORBIDDEN,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Validation | FailureKind::InvalidExpiry => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::VaultNotEmpty => StatusCode::CONFLICT,
        FailureKind::NetworkError | FailureKind::InsufficientShares => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Domain { kind, .. } => (status_for(*kind), kind.code()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Domain { kind, .. } => kind.remediation(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let transient = matches!(
            status,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        );
        let message = if status.is_server_error() && !transient {
            tracing::error!(error = %self, "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self
                    .remediation()
                    .map(|hint| serde_json::json!({ "remediation": hint })),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        Self::Domain {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        Self::Domain {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
