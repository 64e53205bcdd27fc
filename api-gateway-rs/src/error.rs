// api-gateway-rs/src/error.rs
//
// Conversion of pipeline failures into HTTP responses.
//
// Backend failures of any kind collapse into one fixed message; the underlying
// cause only reaches the operator log.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use explainer::LlmError;
use serde::{Deserialize, Serialize};
use sysmon_events::StoreError;
use thiserror::Error;

pub const AI_FAILURE_MESSAGE: &str = "AI processing failed";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    UnknownCollection(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Explain(#[from] LlmError),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownCollection(_) => StatusCode::NOT_FOUND,
            ApiError::Store(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Explain(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the caller
    pub fn public_message(&self) -> String {
        match self {
            ApiError::UnknownCollection(name) => format!("{} not found", name),
            ApiError::Store(StoreError::SourceNotFound { collection, .. }) => {
                format!("{} not found", collection.source_file())
            }
            ApiError::Store(err) => format!("Failed to load {} events", err.collection()),
            ApiError::Explain(_) => AI_FAILURE_MESSAGE.to_string(),
            ApiError::InvalidBody(_) => "Invalid request body".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Explain(err) => {
                tracing::error!(kind = err.kind(), "AI error: {}", err);
            }
            ApiError::Store(err) if !err.is_not_found() => {
                tracing::error!("Event store error: {}", err);
            }
            other => tracing::warn!("{}", other),
        }

        let status = self.status_code();
        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
