//! Application state

use regproxy_core::{Dispatcher, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Default cap on a fan-out request body
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher>,
    /// Deadline for one fan-out, after which the caller gets a 500
    pub dispatch_timeout: Duration,
    /// Largest inbound body accepted for fan-out
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, dispatch_timeout: Duration) -> Self {
        Self {
            registry: dispatcher.registry().clone(),
            dispatcher,
            dispatch_timeout,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }
}
