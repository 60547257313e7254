//! API routes

mod health;
mod proxy;
pub mod upstreams;

use axum::Router;

use crate::state::AppState;

/// Create the main router
///
/// `/register`, `/deregister`, `/list` and `/health` are handled locally;
/// everything else is fanned out to the registered upstreams.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(upstreams::routes())
        .fallback(proxy::proxy)
        .with_state(state)
}
