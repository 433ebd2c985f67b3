//! Application error type.
//!
//! Every error maps to an HTTP status and the `{status, message}` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use validator::ValidationErrors;

use crate::response::ErrorResponse;

/// Result alias used throughout the service.
pub type AppResult<T> = Result<T, AppError>;

/// Service-wide error.
///
/// The warehouse variants are kept apart for logging only; they all surface to
/// callers as the same server error.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("warehouse connection failed: {0}")]
    WarehouseConnection(String),

    #[error("warehouse authentication failed: {0}")]
    WarehouseAuth(String),

    #[error("warehouse query failed: {0}")]
    WarehouseQuery(String),

    #[error("unexpected warehouse response: {0}")]
    WarehouseProtocol(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::WarehouseConnection(_)
            | AppError::WarehouseAuth(_)
            | AppError::WarehouseQuery(_)
            | AppError::WarehouseProtocol(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to callers: the underlying text, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            AppError::Validation(m)
            | AppError::InvalidRequest(m)
            | AppError::Config(m)
            | AppError::WarehouseConnection(m)
            | AppError::WarehouseAuth(m)
            | AppError::WarehouseQuery(m)
            | AppError::WarehouseProtocol(m) => m,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| errors.to_string());
        AppError::Validation(message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(ErrorResponse::new(self.message()))).into_response()
    }
}
