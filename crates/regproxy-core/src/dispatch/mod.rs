//! Fan-out dispatch
//!
//! This module provides the Dispatcher which:
//! - Snapshots the registry and materializes the inbound body once
//! - Forwards a copy of the request to every upstream concurrently
//! - Classifies each outcome and picks the single response to return

mod dispatcher;
mod outcome;
mod request;

pub use dispatcher::Dispatcher;
pub use outcome::{Aggregation, ForwardOutcome, OutcomeClass, is_success};
pub use request::ProxyRequest;
