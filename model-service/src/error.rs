//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

use flood_risk_core::FloodError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request body is missing data or has the wrong shape
    #[error("{0}")]
    BadRequest(String),

    /// Artifacts absent or invalid; message already carries "Model not loaded"
    #[error("{0}")]
    ModelUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ModelUnavailable(msg) => {
                tracing::warn!("Prediction rejected: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<FloodError> for AppError {
    fn from(err: FloodError) -> Self {
        match err {
            FloodError::ModelUnavailable(_) => AppError::ModelUnavailable(err.to_string()),
            FloodError::InputShape(_) => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Malformed JSON, wrong content type or a body that does not deserialize
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
