//! HTTP mapping for service errors

use crate::error::RecommendError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

impl RecommendError {
    /// Status code a handler answers with for this error
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for RecommendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Malformed or incomplete JSON bodies answer 400 like any other bad input
impl From<JsonRejection> for RecommendError {
    fn from(rejection: JsonRejection) -> Self {
        RecommendError::InvalidOperation(rejection.body_text())
    }
}

/// 400 with a plain message, for validation done in handlers
pub fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}
