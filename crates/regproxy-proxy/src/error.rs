//! Proxy error types

use std::error::Error as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProxyError {
    /// Whether the failure was a timeout (connect or overall request)
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProxyError::Http(e) if e.is_timeout())
    }

    /// Error message including the full source chain.
    ///
    /// reqwest hides the interesting part ("connection refused", DNS
    /// failures) in nested sources, which operators need to see.
    pub fn detail(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            let text = err.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = err.source();
        }
        message
    }
}
