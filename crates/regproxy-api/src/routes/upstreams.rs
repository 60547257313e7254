//! Upstream registration routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use super::proxy::proxy;
use crate::error::ApiError;
use crate::state::AppState;

/// Body of POST /register
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub callback: String,
}

/// Body of POST /deregister
#[derive(Debug, Deserialize)]
pub struct DeregisterRequest {
    pub name: String,
}

/// One entry of GET /list
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamInfo {
    pub name: String,
    pub callback: String,
}

/// Decode a JSON body regardless of its declared content type
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// POST /register
async fn register(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let request: RegisterRequest = parse_json(&body)?;
    debug!("Register request: {:?}", request);

    state
        .registry
        .register(&request.name, &request.callback)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /deregister
async fn deregister(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let request: DeregisterRequest = parse_json(&body)?;
    debug!("Deregister request: {:?}", request);

    state.registry.deregister(&request.name).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /list
async fn list(State(state): State<AppState>) -> Result<Json<Vec<UpstreamInfo>>, ApiError> {
    let upstreams = state
        .registry
        .list()
        .await?
        .into_iter()
        .map(|entry| UpstreamInfo {
            name: entry.name,
            callback: entry.target.to_string(),
        })
        .collect();

    Ok(Json(upstreams))
}

/// Create registration routes; other methods on these paths are fanned out
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register).fallback(proxy))
        .route("/deregister", post(deregister).fallback(proxy))
        .route("/list", get(list).fallback(proxy))
}
