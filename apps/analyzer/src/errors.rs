use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::StageError;
use crate::client::GatewayError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Platform error: {0}")]
    Platform(#[from] GatewayError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] StageError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Sign in required".to_string(),
            ),
            AppError::Platform(GatewayError::Unavailable) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PLATFORM_UNAVAILABLE",
                GatewayError::Unavailable.to_string(),
            ),
            AppError::Platform(e) => {
                tracing::error!("Platform error: {e}");
                (StatusCode::BAD_GATEWAY, "PLATFORM_ERROR", e.to_string())
            }
            AppError::Analysis(stage) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ANALYSIS_FAILED",
                stage.to_string(),
            ),
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
