//! HTTP error type
//!
//! Every failure leaves the service as `{"error": "<message>"}`. Storage
//! failures are logged in full and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Validation failure (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or mismatched token (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown id or route (404)
    #[error("{0}")]
    NotFound(String),

    /// Known route, unsupported method (405)
    #[error("{0}")]
    MethodNotAllowed(String),

    /// Entry number could not be assigned (409)
    #[error("{0}")]
    Conflict(String),

    /// Server has no API token configured (500)
    #[error("configuration error")]
    Configuration,

    /// Backend failure (500)
    #[error("internal storage error")]
    Storage(#[source] devlog_common::Error),
}

/// Result alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Configuration | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<devlog_common::Error> for ApiError {
    fn from(err: devlog_common::Error) -> Self {
        use devlog_common::Error;

        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage(err) = &self {
            error!("Storage error: {}", err);
        }

        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
