//! Health check endpoint

use axum::{
    Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use super::proxy::proxy;
use crate::state::AppState;

/// Fixed payload in the draft RFC health check format
const HEALTH_BODY: &str = r#"{"status": "pass"}"#;

/// Health check handler
async fn health() -> impl IntoResponse {
    metrics::counter!("regproxy_health_checks_total").increment(1);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/health+json")],
        HEALTH_BODY,
    )
}

/// Create health routes; other methods on the path are fanned out
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health).fallback(proxy))
}
