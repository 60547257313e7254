//! Outcome classification and response selection

use http::StatusCode;
use regproxy_proxy::{ProxyError, UpstreamResponse};

use crate::error::CoreError;

/// Whether `status` counts as a successful upstream reply
pub fn is_success(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// The three mutually exclusive outcome classes, lowest precedence last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    TransportError,
    NonSuccessResponse,
    SuccessResponse,
}

impl OutcomeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeClass::TransportError => "transport_error",
            OutcomeClass::NonSuccessResponse => "non_success",
            OutcomeClass::SuccessResponse => "success",
        }
    }
}

/// Result of forwarding to one upstream
#[derive(Debug)]
pub enum ForwardOutcome {
    TransportError { upstream: String, message: String },
    NonSuccessResponse { upstream: String, response: UpstreamResponse },
    SuccessResponse { upstream: String, response: UpstreamResponse },
}

impl ForwardOutcome {
    /// Classify a transport result
    pub fn classify(upstream: String, result: Result<UpstreamResponse, ProxyError>) -> Self {
        match result {
            Err(e) => ForwardOutcome::TransportError {
                upstream,
                message: e.detail(),
            },
            Ok(response) if is_success(response.status) => {
                ForwardOutcome::SuccessResponse { upstream, response }
            }
            Ok(response) => ForwardOutcome::NonSuccessResponse { upstream, response },
        }
    }

    pub fn class(&self) -> OutcomeClass {
        match self {
            ForwardOutcome::TransportError { .. } => OutcomeClass::TransportError,
            ForwardOutcome::NonSuccessResponse { .. } => OutcomeClass::NonSuccessResponse,
            ForwardOutcome::SuccessResponse { .. } => OutcomeClass::SuccessResponse,
        }
    }

    pub fn upstream(&self) -> &str {
        match self {
            ForwardOutcome::TransportError { upstream, .. }
            | ForwardOutcome::NonSuccessResponse { upstream, .. }
            | ForwardOutcome::SuccessResponse { upstream, .. } => upstream,
        }
    }
}

/// Per-dispatch aggregation state.
///
/// Counts down from the number of upstreams in the snapshot. For each class
/// only the most recently recorded outcome is kept; which one that is
/// depends on arrival order and is not meaningful.
#[derive(Debug)]
pub struct Aggregation {
    outstanding: usize,
    transport_error: Option<(String, String)>,
    non_success: Option<UpstreamResponse>,
    success: Option<UpstreamResponse>,
}

impl Aggregation {
    pub fn new(expected: usize) -> Self {
        Self {
            outstanding: expected,
            transport_error: None,
            non_success: None,
            success: None,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_done(&self) -> bool {
        self.outstanding == 0
    }

    pub fn record(&mut self, outcome: ForwardOutcome) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match outcome {
            ForwardOutcome::TransportError { upstream, message } => {
                self.transport_error = Some((upstream, message));
            }
            ForwardOutcome::NonSuccessResponse { response, .. } => {
                self.non_success = Some(response);
            }
            ForwardOutcome::SuccessResponse { response, .. } => {
                self.success = Some(response);
            }
        }
    }

    /// Count every outstanding upstream as a transport error
    pub fn abandon_outstanding(&mut self, reason: &str) {
        if self.outstanding > 0 {
            self.transport_error = Some((
                format!("{} upstream(s)", self.outstanding),
                reason.to_string(),
            ));
            self.outstanding = 0;
        }
    }

    /// Pick the response: any transport error fails the dispatch, then a
    /// non-success response wins over any success.
    pub fn finish(self) -> Result<UpstreamResponse, CoreError> {
        if let Some((upstream, message)) = self.transport_error {
            return Err(CoreError::Transport { upstream, message });
        }
        self.non_success
            .or(self.success)
            .ok_or(CoreError::NoUpstreams)
    }
}
