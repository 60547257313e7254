//! Regproxy Upstream Transport
//!
//! This crate provides the client used to forward requests to registered
//! upstreams: a pooled reqwest client with configurable timeouts and an
//! optional caching DNS resolver.

pub mod client;
pub mod dns;
pub mod error;

pub use client::{HttpTransport, TransportConfig, UpstreamResponse, UpstreamTransport};
pub use dns::{CachingResolver, DnsCacheConfig};
pub use error::ProxyError;
