use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::order::OrderStatus;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Stock issues: Product 'Black Ink 8oz' has insufficient stock. Available: 1, Requested: 3",
    "details": ["Product 'Black Ink 8oz' has insufficient stock. Available: 1, Requested: 3"],
    "request_id": "req-abc123xyz",
    "timestamp": "2025-01-15T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Individual violations when a request fails for more than one reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("Products not found: {}", join_ids(.0))]
    ProductsNotFound(Vec<i32>),

    #[error("Stock issues: {}", .0.join("; "))]
    InsufficientStock(Vec<String>),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<axum::extract::rejection::JsonRejection> for ServiceError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ServiceError::ValidationError(vec![rejection.body_text()])
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(flatten_validation_errors(&err))
    }
}

/// Flattens nested validator output into one message per violation, sorted for
/// stable responses.
pub fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    use validator::ValidationErrorsKind;

    let mut messages = Vec::new();
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", field, error.code));
                    messages.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                messages.extend(flatten_validation_errors(nested));
            }
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    messages.extend(flatten_validation_errors(nested));
                }
            }
        }
    }
    messages.sort();
    messages
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::ProductsNotFound(_)
            | Self::InsufficientStock(_)
            | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::ExternalServiceError(_) => "Payment processor unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// Individual violations carried by multi-cause errors.
    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::ValidationError(messages) | Self::InsufficientStock(messages) => {
                Some(messages.clone())
            }
            Self::ProductsNotFound(ids) => Some(ids.iter().map(|id| id.to_string()).collect()),
            _ => None,
        }
    }

    /// True when the error is a unique-constraint violation reported by the database.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::DatabaseError(err) => is_unique_violation(err),
            _ => false,
        }
    }

    /// True when the database refused the write because another transaction
    /// held the lock (SQLite busy, Postgres deadlock or serialization failure).
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::DatabaseError(err) => {
                let message = err.to_string().to_ascii_lowercase();
                message.contains("database is locked")
                    || message.contains("deadlock detected")
                    || message.contains("could not serialize access")
            }
            _ => false,
        }
    }
}

/// Detects unique-constraint violations across the Postgres and SQLite drivers.
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    ) {
        return true;
    }
    let message = err.to_string().to_ascii_lowercase();
    message.contains("unique constraint") || message.contains("duplicate key")
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
