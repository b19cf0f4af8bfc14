use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::refinement::error::{
    RefineError, AUTH_FAILED_MESSAGE, INVALID_API_KEY_MESSAGE, UNEXPECTED_RESPONSE_MESSAGE,
};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("LLM authentication failed: {0}")]
    LlmAuthentication(String),

    #[error("Stored API key is unusable: {0}")]
    InvalidApiKey(#[from] CredentialError),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RefineError> for AppError {
    fn from(err: RefineError) -> Self {
        match err {
            RefineError::InvalidInput(msg) => AppError::Validation(msg),
            RefineError::Authentication(msg) => AppError::LlmAuthentication(msg),
            RefineError::ServiceResponse => {
                AppError::BadGateway(UNEXPECTED_RESPONSE_MESSAGE.to_string())
            }
            RefineError::Extraction(e) => AppError::UnprocessableEntity(e.to_string()),
            RefineError::Llm(e) => AppError::Llm(e.to_string()),
            RefineError::Internal(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::LlmAuthentication(msg) => {
                tracing::warn!("LLM authentication failed: {msg}");
                (
                    StatusCode::UNAUTHORIZED,
                    "LLM_AUTHENTICATION_FAILED",
                    AUTH_FAILED_MESSAGE.to_string(),
                )
            }
            AppError::InvalidApiKey(e) => {
                tracing::warn!("Stored API key is unusable: {e}");
                (
                    StatusCode::BAD_REQUEST,
                    "INVALID_API_KEY",
                    INVALID_API_KEY_MESSAGE.to_string(),
                )
            }
            AppError::BadGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                "UNEXPECTED_LLM_RESPONSE",
                msg.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
