//! Dispatcher that fans a request out to every registered upstream

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::Request;
use http_body::Body;
use regproxy_proxy::{UpstreamResponse, UpstreamTransport};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use super::outcome::{Aggregation, ForwardOutcome, is_success};
use super::request::ProxyRequest;
use crate::cancel::CancelSignal;
use crate::error::CoreError;
use crate::registry::Registry;

/// Forwards each inbound request to all upstreams and picks one response
pub struct Dispatcher {
    registry: Arc<Registry>,
    transport: Arc<dyn UpstreamTransport>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fan `request` out to every registered upstream.
    ///
    /// Returns once every upstream has answered or `cancel` fires. Forwards
    /// still running at cancellation are left to finish on their own
    /// transport timeout; their outcomes are dropped.
    pub async fn dispatch<B>(
        &self,
        request: Request<B>,
        cancel: &CancelSignal,
    ) -> Result<UpstreamResponse, CoreError>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let upstreams = self.registry.snapshot().await?;
        if upstreams.is_empty() {
            metrics::counter!("regproxy_dispatch_total", "result" => "no_upstreams").increment(1);
            return Err(CoreError::NoUpstreams);
        }

        // A stalled inbound body must not outlive the deadline either
        let request = tokio::select! {
            materialized = ProxyRequest::materialize(request) => Arc::new(materialized?),
            reason = cancel.fired() => {
                warn!("Dispatch aborted while reading request body: {}", reason);
                metrics::counter!("regproxy_dispatch_total", "result" => "cancelled").increment(1);
                return Err(CoreError::Cancelled(reason));
            }
        };
        let expected = upstreams.len();
        debug!(
            "Dispatching {} {} to {} upstream(s)",
            request.method,
            request.path(),
            expected
        );

        // Capacity for every outcome, so forwards never block on a
        // receiver that already gave up
        let (tx, mut rx) = mpsc::channel(expected);
        for (name, target) in upstreams {
            tokio::spawn(forward(
                self.transport.clone(),
                request.clone(),
                name,
                target,
                tx.clone(),
            ));
        }
        drop(tx);

        let mut aggregation = Aggregation::new(expected);
        let fired = cancel.fired();
        tokio::pin!(fired);

        while !aggregation.is_done() {
            tokio::select! {
                outcome = rx.recv() => match outcome {
                    Some(outcome) => aggregation.record(outcome),
                    None => aggregation.abandon_outstanding("forward task exited without reporting"),
                },
                reason = &mut fired => {
                    warn!(
                        "Dispatch of {} aborted with {} upstream(s) outstanding: {}",
                        request.path(),
                        aggregation.outstanding(),
                        reason
                    );
                    metrics::counter!("regproxy_dispatch_total", "result" => "cancelled").increment(1);
                    return Err(CoreError::Cancelled(reason));
                }
            }
        }

        let result = aggregation.finish();
        let label = match &result {
            Ok(response) if is_success(response.status) => "success",
            Ok(_) => "non_success",
            Err(_) => "transport_error",
        };
        metrics::counter!("regproxy_dispatch_total", "result" => label).increment(1);

        result
    }
}

/// Forward one copy of `request` to `target` and report the outcome
async fn forward(
    transport: Arc<dyn UpstreamTransport>,
    request: Arc<ProxyRequest>,
    name: String,
    target: Url,
    tx: mpsc::Sender<ForwardOutcome>,
) {
    let trace_id = Uuid::new_v4();
    let span = info_span!("forward", %trace_id, upstream = %name);

    async move {
        info!(
            "Forwarding request {} (ID {}) to upstream {} at {}",
            request.path(),
            trace_id,
            name,
            target
        );

        let start = Instant::now();
        let result = match request.retarget(&target) {
            Ok(outbound) => transport.send(outbound).await,
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        let outcome = ForwardOutcome::classify(name, result);
        match &outcome {
            ForwardOutcome::TransportError { upstream, message } => warn!(
                "Error forwarding request {} (ID {}) to upstream {} at {}: {}",
                request.path(),
                trace_id,
                upstream,
                target,
                message
            ),
            ForwardOutcome::NonSuccessResponse { upstream, response } => warn!(
                "Error forwarding request {} (ID {}) to upstream {} at {}: {}",
                request.path(),
                trace_id,
                upstream,
                target,
                response.status
            ),
            ForwardOutcome::SuccessResponse { upstream, response } => info!(
                "Success forwarding request {} (ID {}) to upstream {} at {} in {:?}: {}",
                request.path(),
                trace_id,
                upstream,
                target,
                elapsed,
                response.status
            ),
        }

        metrics::counter!("regproxy_forward_total", "class" => outcome.class().as_str())
            .increment(1);
        metrics::histogram!("regproxy_forward_duration_seconds").record(elapsed.as_secs_f64());

        // The aggregator may have stopped listening after a cancellation
        if tx.send(outcome).await.is_err() {
            debug!("Dropping outcome of abandoned dispatch (ID {})", trace_id);
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelReason;
    use async_trait::async_trait;
    use http::{HeaderMap, StatusCode};
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};
    use parking_lot::Mutex;
    use regproxy_proxy::ProxyError;
    use regproxy_storage::MemoryStore;
    use std::collections::HashMap;
    use std::time::Duration;

    /// How a fake upstream host behaves
    #[derive(Clone)]
    enum Behavior {
        Status(u16),
        Unreachable,
        Slow(Duration),
    }

    #[derive(Default)]
    struct FakeTransport {
        hosts: HashMap<String, Behavior>,
        calls: Mutex<Vec<Request<Bytes>>>,
    }

    impl FakeTransport {
        fn with(hosts: &[(&str, Behavior)]) -> Arc<Self> {
            Arc::new(Self {
                hosts: hosts
                    .iter()
                    .map(|(h, b)| (h.to_string(), b.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl UpstreamTransport for FakeTransport {
        async fn send(&self, request: Request<Bytes>) -> Result<UpstreamResponse, ProxyError> {
            let host = request.uri().host().unwrap_or_default().to_string();
            self.calls.lock().push(request);

            let reply = |status: u16| UpstreamResponse {
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from(host.clone()),
            };

            match self.hosts.get(&host) {
                Some(Behavior::Status(status)) => Ok(reply(*status)),
                Some(Behavior::Slow(delay)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(reply(200))
                }
                Some(Behavior::Unreachable) | None => Err(ProxyError::InvalidRequest(format!(
                    "dial tcp: lookup {}: no such host",
                    host
                ))),
            }
        }
    }

    async fn dispatcher(
        upstreams: &[&str],
        transport: Arc<FakeTransport>,
    ) -> Dispatcher {
        let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new())));
        for host in upstreams {
            registry
                .register(host, &format!("http://{}", host))
                .await
                .unwrap();
        }
        Dispatcher::new(registry, transport)
    }

    fn inbound(body: &'static str) -> Request<Full<Bytes>> {
        Request::post("/command?id=7")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_success_calls_every_upstream_once() {
        for n in 1..=5 {
            let hosts: Vec<String> = (0..n).map(|i| format!("up{}.test", i)).collect();
            let behaviors: Vec<(&str, Behavior)> = hosts
                .iter()
                .map(|h| (h.as_str(), Behavior::Status(200)))
                .collect();
            let transport = FakeTransport::with(&behaviors);
            let names: Vec<&str> = hosts.iter().map(String::as_str).collect();
            let dispatcher = dispatcher(&names, transport.clone()).await;

            let response = dispatcher
                .dispatch(inbound("cmd"), &CancelSignal::new())
                .await
                .unwrap();

            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(transport.call_count(), n);
        }
    }

    #[tokio::test]
    async fn test_every_upstream_gets_the_same_request() {
        let transport = FakeTransport::with(&[
            ("a.test", Behavior::Status(200)),
            ("b.test", Behavior::Status(200)),
        ]);
        let dispatcher = dispatcher(&["a.test", "b.test"], transport.clone()).await;

        dispatcher
            .dispatch(inbound("payload"), &CancelSignal::new())
            .await
            .unwrap();

        let calls = transport.calls.lock();
        let mut hosts: Vec<_> = calls.iter().map(|r| r.uri().host().unwrap().to_string()).collect();
        hosts.sort();
        assert_eq!(hosts, vec!["a.test", "b.test"]);
        for call in calls.iter() {
            assert_eq!(call.method(), http::Method::POST);
            assert_eq!(call.uri().path(), "/command");
            assert_eq!(call.uri().query(), Some("id=7"));
            assert_eq!(call.body(), &Bytes::from_static(b"payload"));
        }
    }

    #[tokio::test]
    async fn test_no_upstreams_makes_no_calls() {
        let transport = FakeTransport::with(&[]);
        let dispatcher = dispatcher(&[], transport.clone()).await;

        let err = dispatcher
            .dispatch(inbound("cmd"), &CancelSignal::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NoUpstreams));
        assert!(err.is_client_error());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_beats_partial_success() {
        let transport = FakeTransport::with(&[
            ("a.test", Behavior::Status(200)),
            ("b.test", Behavior::Status(200)),
            ("down.test", Behavior::Unreachable),
        ]);
        let dispatcher = dispatcher(&["a.test", "b.test", "down.test"], transport.clone()).await;

        let err = dispatcher
            .dispatch(inbound("cmd"), &CancelSignal::new())
            .await
            .unwrap_err();

        match err {
            CoreError::Transport { upstream, message } => {
                assert_eq!(upstream, "down.test");
                assert!(message.contains("no such host"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_success_is_surfaced() {
        let transport = FakeTransport::with(&[
            ("a.test", Behavior::Status(200)),
            ("b.test", Behavior::Status(404)),
            ("c.test", Behavior::Status(200)),
        ]);
        let dispatcher = dispatcher(&["a.test", "b.test", "c.test"], transport).await;

        let response = dispatcher
            .dispatch(inbound("cmd"), &CancelSignal::new())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, Bytes::from_static(b"b.test"));
    }

    #[tokio::test]
    async fn test_cancellation_returns_promptly() {
        let transport = FakeTransport::with(&[
            ("fast.test", Behavior::Status(200)),
            ("slow.test", Behavior::Slow(Duration::from_secs(10))),
        ]);
        let dispatcher = dispatcher(&["fast.test", "slow.test"], transport).await;

        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = dispatcher.dispatch(inbound("cmd"), &cancel).await.unwrap_err();

        assert!(matches!(err, CoreError::Cancelled(CancelReason::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_deadline_returns_promptly() {
        let transport = FakeTransport::with(&[("slow.test", Behavior::Slow(Duration::from_secs(10)))]);
        let dispatcher = dispatcher(&["slow.test"], transport).await;

        let start = Instant::now();
        let err = dispatcher
            .dispatch(inbound("cmd"), &CancelSignal::with_timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Cancelled(CancelReason::DeadlineExceeded)
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_deadline_applies_while_reading_body() {
        let transport = FakeTransport::with(&[("a.test", Behavior::Status(200))]);
        let dispatcher = dispatcher(&["a.test"], transport.clone()).await;

        let stalled = StreamBody::new(futures::stream::pending::<Result<Frame<Bytes>, std::io::Error>>());
        let request = Request::post("/command").body(stalled).unwrap();

        let start = Instant::now();
        let err = dispatcher
            .dispatch(request, &CancelSignal::with_timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Cancelled(CancelReason::DeadlineExceeded)
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_taken_per_dispatch() {
        let transport = FakeTransport::with(&[
            ("a.test", Behavior::Status(200)),
            ("b.test", Behavior::Status(500)),
        ]);
        let dispatcher = dispatcher(&["a.test"], transport.clone()).await;

        let first = dispatcher
            .dispatch(inbound("cmd"), &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(first.status, StatusCode::OK);

        dispatcher
            .registry()
            .register("b.test", "http://b.test")
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(inbound("cmd"), &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(second.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.call_count(), 3);
    }
}
