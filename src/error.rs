// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Every failure a handler can report. The `Display` text is the client
/// facing message and is rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Invalid poll id")]
    InvalidPollId,

    /// Semantically invalid payload field. HTTP 422.
    #[error("{0}")]
    Unprocessable(&'static str),

    #[error("Poll not found")]
    PollNotFound,

    #[error("Invalid item")]
    InvalidItem,

    /// Lookup failure carrying the store's own message. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Store failure, message passed through from the backend. HTTP 500.
    #[error("{0}")]
    Store(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidJson | ApiError::InvalidPollId | ApiError::InvalidItem => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PollNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
