//! Regproxy HTTP API
//!
//! This crate provides the Axum-based HTTP surface: the registration
//! endpoints, the health check, and the fan-out fallback that forwards every
//! other request to all registered upstreams.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
