//! Core error types

use thiserror::Error;

use crate::cancel::CancelReason;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] regproxy_storage::StorageError),

    #[error("No upstreams registered")]
    NoUpstreams,

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Error forwarding request to upstream {upstream}: {message}")]
    Transport { upstream: String, message: String },

    #[error("Request cancelled: {0}")]
    Cancelled(CancelReason),
}

impl CoreError {
    /// Whether the caller, not an upstream or the proxy, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::NoUpstreams | CoreError::InvalidRegistration(_) | CoreError::RequestBody(_)
        )
    }
}
