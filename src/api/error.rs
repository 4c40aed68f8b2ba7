//! HTTP error responses

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::EnvelopeError;

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: &'static str,
    pub message: String,
}

/// Handler error; wraps the crate error so `?` works in handlers
#[derive(Debug)]
pub struct AppError(pub EnvelopeError);

impl<E> From<E> for AppError
where
    E: Into<EnvelopeError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: true,
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for EnvelopeError {
    fn from(rejection: JsonRejection) -> Self {
        EnvelopeError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for EnvelopeError {
    fn from(rejection: PathRejection) -> Self {
        EnvelopeError::Validation(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for EnvelopeError {
    fn from(rejection: QueryRejection) -> Self {
        EnvelopeError::Validation(format!("Invalid query: {}", rejection.body_text()))
    }
}
