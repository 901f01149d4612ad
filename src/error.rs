use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{extract::ExtractError, models::JobLookup};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unknown job identifier")]
    NotFound,
    #[error("filesystem operation failed")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(JobLookup::NotFound.to_response()),
            )
                .into_response(),
            Self::Io(err) => {
                error!("Request failed on filesystem access: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Storage unavailable" })),
                )
                    .into_response()
            }
            Self::Internal(err) => {
                error!("Request failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal error" })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("artifact name {0:?} does not match the expected layout")]
    MalformedName(String),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("explanation fan-out failed: {0}")]
    Generation(String),
    #[error("failed to encode result document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
}
