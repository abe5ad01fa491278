use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::agent::PipelineError;
use crate::sorting::ApplyError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Transport(e) => AppError::Llm(e.to_string()),
            PipelineError::Cancelled => AppError::Cancelled,
        }
    }
}

impl From<ApplyError> for AppError {
    fn from(e: ApplyError) -> Self {
        AppError::Internal(anyhow::Error::new(e).context("validated sort result failed to apply"))
    }
}

impl AppError {
    /// Stable code plus a message that is safe to show an end user.
    pub fn code_and_message(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The AI service could not be reached. Please try again.".to_string(),
                )
            }
            AppError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CANCELLED",
                "The request was cancelled before it completed".to_string(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.code_and_message();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;

    #[test]
    fn test_transport_failure_maps_to_bad_gateway_with_safe_message() {
        let err: AppError = PipelineError::Transport(LlmError::Api {
            status: 401,
            message: "invalid x-api-key sk-live-123".to_string(),
        })
        .into();
        let (status, code, message) = err.code_and_message();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "LLM_ERROR");
        assert!(!message.contains("sk-live"));
    }

    #[test]
    fn test_cancelled_maps_to_cancelled_code() {
        let err: AppError = PipelineError::Cancelled.into();
        assert_eq!(err.code_and_message().1, "CANCELLED");
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = AppError::Validation("jobDescription cannot be empty".to_string());
        let (status, _, message) = err.code_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "jobDescription cannot be empty");
    }
}
