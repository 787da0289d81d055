//! Error Types for the DataTable API
//!
//! - [`HostError`] is what host operations (hooks, facade, scripting) fail
//!   with.
//! - [`ApiError`] with [`ErrorCode`] is the HTTP form: JSON for the hook
//!   endpoints, a formatted HTML message for the browsing endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use datatable_core::{DataError, ExtractError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// HOST ERRORS
// ============================================================================

/// Failure of a host-facing operation.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Expensive operation limit of {limit} reached")]
    ExpensiveLimit { limit: u32 },

    #[error("Invalid page title '{title}': {reason}")]
    InvalidPage { title: String, reason: String },
}

impl From<ExtractError> for HostError {
    fn from(err: ExtractError) -> Self {
        HostError::Data(err.into())
    }
}

impl From<StorageError> for HostError {
    fn from(err: StorageError) -> Self {
        HostError::Data(err.into())
    }
}

pub type HostResult<T> = Result<T, HostError>;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Table name does not form a valid title
    InvalidTableName,

    /// Page title is not valid
    InvalidPage,

    /// Filter or order fragment could not be parsed
    InvalidQuery,

    /// Directive could not be parsed
    MalformedDirective,

    // ========================================================================
    // Limits (429)
    // ========================================================================
    /// Too many expensive operations in one request
    ExpensiveLimit,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Storage operation failed
    StorageError,

    /// Configuration is invalid
    ConfigError,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidTableName
            | ErrorCode::InvalidPage
            | ErrorCode::InvalidQuery
            | ErrorCode::MalformedDirective => StatusCode::BAD_REQUEST,

            ErrorCode::ExpensiveLimit => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::StorageError | ErrorCode::ConfigError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidTableName => "Invalid table name",
            ErrorCode::InvalidPage => "Invalid page title",
            ErrorCode::InvalidQuery => "Invalid filter or order",
            ErrorCode::MalformedDirective => "Malformed directive",
            ErrorCode::ExpensiveLimit => "Expensive operation limit reached",
            ErrorCode::StorageError => "Storage operation failed",
            ErrorCode::ConfigError => "Invalid configuration",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        let message = err.to_string();
        match err {
            DataError::Extract(ExtractError::InvalidTableName { .. }) => {
                ApiError::new(ErrorCode::InvalidTableName, message)
            }
            DataError::Extract(ExtractError::MalformedDirective { .. }) => {
                ApiError::new(ErrorCode::MalformedDirective, message)
            }
            DataError::Storage(StorageError::InvalidQuery { .. }) => {
                ApiError::new(ErrorCode::InvalidQuery, message)
            }
            DataError::Storage(_) => {
                tracing::error!(error = %message, "Storage error");
                ApiError::new(ErrorCode::StorageError, message)
            }
            DataError::Config(_) => {
                tracing::error!(error = %message, "Configuration error");
                ApiError::new(ErrorCode::ConfigError, message)
            }
        }
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Data(e) => e.into(),
            e @ HostError::ExpensiveLimit { .. } => {
                ApiError::new(ErrorCode::ExpensiveLimit, e.to_string())
            }
            e @ HostError::InvalidPage { .. } => ApiError::new(ErrorCode::InvalidPage, e.to_string()),
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_errors_are_client_errors() {
        let err: ApiError = HostError::from(StorageError::InvalidQuery {
            reason: "Unknown field 'Salary'".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InvalidQuery);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Salary"));
    }

    #[test]
    fn test_storage_failures_are_server_errors() {
        let err: ApiError = DataError::from(StorageError::TransactionFailed {
            reason: "disk full".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::StorageError);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_expensive_limit_code() {
        let err: ApiError = HostError::ExpensiveLimit { limit: 2 }.into();
        assert_eq!(err.code, ErrorCode::ExpensiveLimit);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message, "Expensive operation limit of 2 reached");
    }

    #[test]
    fn test_error_code_serializes_screaming() {
        let json = serde_json::to_string(&ApiError::from_code(ErrorCode::InvalidTableName)).unwrap();
        assert!(json.contains("\"INVALID_TABLE_NAME\""));
    }
}
