//! Regproxy Core Business Logic
//!
//! This crate provides the upstream registry facade and the fan-out
//! dispatcher that forwards one request to every registered upstream and
//! aggregates the outcomes into a single response.

pub mod cancel;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod registry;

pub use cancel::{CancelReason, CancelSignal};
pub use dispatch::{Aggregation, Dispatcher, ForwardOutcome, OutcomeClass, ProxyRequest};
pub use error::CoreError;
pub use registry::{Registry, UpstreamEntry};
