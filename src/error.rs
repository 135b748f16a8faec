//! Crate-wide error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::generation::GenerationStatus;
use crate::services::queue::QueueError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Image rejected by content safety check: {0}")]
    Safety(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Template not found: {0}")]
    TemplateNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("No images generated")]
    NoImagesProduced,

    #[error("Generation queue is full")]
    QueueFull,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is not completed (status: {status})")]
    NotCompleted {
        job_id: String,
        status: GenerationStatus,
    },

    #[error("Authentication failed: {0}")]
    Unauthorized(String),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full => AppError::QueueFull,
            QueueError::Closed => AppError::Cancelled,
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::Safety(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request_error",
                Some("content_rejected"),
            ),
            AppError::InsufficientCredits { .. } => (
                StatusCode::PAYMENT_REQUIRED,
                "billing_error",
                Some("insufficient_credits"),
            ),
            AppError::TemplateNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found_error", Some("template_not_found"))
            }
            AppError::UserNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found_error", Some("user_not_found"))
            }
            AppError::GenerationFailed(_) | AppError::NoImagesProduced => {
                (StatusCode::BAD_GATEWAY, "backend_error", Some("generation_failed"))
            }
            AppError::QueueFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_error",
                Some("queue_full"),
            ),
            AppError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_error",
                Some("shutting_down"),
            ),
            AppError::ShutdownTimeout(_) | AppError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", None),
            AppError::NotCompleted { .. } => {
                (StatusCode::CONFLICT, "invalid_request_error", Some("not_completed"))
            }
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                Some("invalid_token"),
            ),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = self.classify();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        // Storage details stay in the logs.
        let message = match &self {
            AppError::Storage(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message,
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
