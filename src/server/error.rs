//! Error responses for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::LensError;

/// JSON body returned on error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A request failure rendered as `{"error": "..."}` with a mapped status.
#[derive(Debug)]
pub enum ApiError {
    Lens(LensError),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Lens(err) => status_for_error(err),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Lens(LensError::InvalidArgument(msg)) => msg.clone(),
            ApiError::Lens(err) => err.to_string(),
        }
    }
}

fn status_for_error(err: &LensError) -> StatusCode {
    match err {
        LensError::InvalidArgument(_) | LensError::IndexNotFound(_) => StatusCode::BAD_REQUEST,
        LensError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LensError> for ApiError {
    fn from(err: LensError) -> Self {
        ApiError::Lens(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(%status, "search failed: {message}");
        } else {
            tracing::debug!(%status, "rejected request: {message}");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
