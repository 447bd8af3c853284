//! HTTP error envelope and status mapping.
//!
//! Every failed request renders `{"error", "message", "code"}`. Parse- and
//! validation-class errors surface the offending detail; database and
//! internal errors log the underlying cause and report a sanitized message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use instantgate_core::GateError;
use serde::Serialize;
use thiserror::Error;

use crate::security::AuthError;

/// Request-level failure with a fixed HTTP mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Table not found")]
    TableNotFound,
    #[error("Record not found")]
    RecordNotFound,
    /// Parse/build rejected user input (unknown column, bad filter)
    #[error("{0}")]
    InvalidFilter(String),
    /// Malformed or empty request body
    #[error("{0}")]
    InvalidInput(String),
    /// Schema or payload shape prevents the operation
    #[error("{0}")]
    UnprocessableShape(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Forbidden")]
    Forbidden,
    /// Driver-level failure; cause is logged, message sanitized
    #[error("Database error")]
    Database(#[source] GateError),
    #[error("Internal error")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: String,
    message: String,
    code: u16,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::TableNotFound | ApiError::RecordNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidFilter(_)
            | ApiError::InvalidInput(_)
            | ApiError::UnprocessableShape(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::TableNotFound => "Table not found".to_string(),
            ApiError::RecordNotFound => "Record not found".to_string(),
            ApiError::InvalidFilter(detail)
            | ApiError::InvalidInput(detail)
            | ApiError::UnprocessableShape(detail)
            | ApiError::Unauthorized(detail) => detail.clone(),
            ApiError::Forbidden => "Forbidden".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database(cause) => {
                tracing::error!(error = %cause, "database error while handling request");
            }
            ApiError::Internal(cause) => {
                tracing::error!(error = %cause, "internal error while handling request");
            }
            _ => {}
        }

        let status = self.status();
        let envelope = ErrorEnvelope {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.message(),
            code: status.as_u16(),
        };
        (status, Json(envelope)).into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::TableNotFound { .. } => ApiError::TableNotFound,
            GateError::UnknownColumn { .. } | GateError::InvalidFilter { .. } => {
                ApiError::InvalidFilter(err.to_string())
            }
            GateError::NoPrimaryKey { .. } | GateError::NoUpdatableColumns { .. } => {
                ApiError::UnprocessableShape(err.to_string())
            }
            GateError::Connect { .. } | GateError::Introspect { .. } | GateError::Execution { .. } => {
                ApiError::Database(err)
            }
            GateError::Configuration { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}
