//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use regproxy_core::CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Core(e) => match e {
                CoreError::NoUpstreams => (StatusCode::BAD_REQUEST, "NO_UPSTREAMS", e.to_string()),
                CoreError::InvalidRegistration(_) | CoreError::RequestBody(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string())
                }
                CoreError::Transport { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_UNAVAILABLE",
                    e.to_string(),
                ),
                CoreError::Cancelled(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CANCELLED", e.to_string())
                }
                CoreError::Storage(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    e.to_string(),
                ),
            },
        };

        if status.is_server_error() {
            error!("Request failed: {}", message);
        }

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
