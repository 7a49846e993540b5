//! API error types
//!
//! Provides structured error responses for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tally_analytics::AnalyticsError;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request parameters
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),

    /// Analytics error
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Analytics(e) if e.is_request_error() => StatusCode::BAD_REQUEST,
            Self::Analytics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Analytics(e) => match e {
                AnalyticsError::InvalidFilter(_) => "INVALID_FILTER",
                AnalyticsError::InvalidOperator(_) => "INVALID_OPERATOR",
                AnalyticsError::InvalidDate(_) => "INVALID_DATE",
                AnalyticsError::InvalidGroupBy(_) => "INVALID_GROUP_BY",
                AnalyticsError::UnknownMetric(_) => "UNKNOWN_METRIC",
                AnalyticsError::UnknownTable(_) => "UNKNOWN_TABLE",
                AnalyticsError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
                AnalyticsError::OutOfRange(_) => "OUT_OF_RANGE",
                AnalyticsError::Registry(_) => "INTERNAL_ERROR",
                AnalyticsError::Backend(_) => "QUERY_FAILED",
            },
        }
    }

    /// Message safe to return to the caller
    ///
    /// Store and configuration failures are reported without detail.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub error: &'static str,
    /// Error message (human-readable)
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::warn!(
            error_code = self.code(),
            error_message = %self,
            status = %status,
            "API error"
        );

        let body = ErrorResponse {
            error: self.code(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tally_query::QueryError;

    #[test]
    fn test_request_errors_are_400() {
        let err = ApiError::from(AnalyticsError::InvalidGroupBy("weather".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_GROUP_BY");
        assert!(err.public_message().contains("weather"));
    }

    #[test]
    fn test_backend_errors_are_opaque() {
        let err = ApiError::from(AnalyticsError::Backend(QueryError::Connection(
            "10.0.0.5:8123 refused".into(),
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "QUERY_FAILED");
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn test_bad_request() {
        let err = ApiError::bad_request("group_by is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
