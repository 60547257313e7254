//! Cancellation signal for in-flight dispatches

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a dispatch stopped waiting for its upstreams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The inbound request went away
    Cancelled,
    /// The inbound request ran out of time
    DeadlineExceeded,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::Cancelled => "context canceled",
            CancelReason::DeadlineExceeded => "context deadline exceeded",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound cancellation: an explicit token plus an optional deadline.
///
/// Clones share the same token, so cancelling any clone fires all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that only fires when cancelled explicitly
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that also fires once `timeout` has elapsed from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal fires
    pub async fn fired(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}
