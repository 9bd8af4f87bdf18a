// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use task_progress_core::{ChannelError, ReportError};
use task_progress_db::DbError;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Status channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Reporting error: {0}")]
    Report(#[from] ReportError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Channel(channel_err) => {
                let (status, error_msg) = match channel_err {
                    ChannelError::JoinTimeout { task_id, timeout_ms } => {
                        tracing::warn!(task_id = %task_id, timeout_ms, "Timed out joining task result");
                        (StatusCode::GATEWAY_TIMEOUT, "Task result not available yet")
                    }
                    ChannelError::Closed { task_id } => {
                        tracing::error!(task_id = %task_id, "Status channel closed");
                        (StatusCode::SERVICE_UNAVAILABLE, "Status channel closed")
                    }
                    ChannelError::Backend(msg) => {
                        tracing::error!(message = %msg, "Status channel backend error");
                        (StatusCode::SERVICE_UNAVAILABLE, "Status channel unavailable")
                    }
                };
                (
                    status,
                    ErrorResponse::with_details(error_msg, channel_err.to_string()),
                )
            }
            ApiError::Report(report_err) => {
                tracing::error!(error = %report_err, "Failed to submit task");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Failed to submit task", report_err.to_string()),
                )
            }
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Database error", db_err.to_string()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
