//! Upstream transport

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::dns::{CachingResolver, DnsCacheConfig};
use crate::error::ProxyError;

/// A complete reply from one upstream, body already read
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends a fully built request to one upstream.
///
/// `Err` means no complete HTTP response was obtained (DNS, connect, timeout,
/// body read). Any status code, including 4xx and 5xx, is an `Ok`.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, request: Request<Bytes>) -> Result<UpstreamResponse, ProxyError>;
}

/// Upstream client configuration
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Overall budget for one upstream call, including reading the body
    pub request_timeout: Duration,
    /// Budget for establishing the TCP connection
    pub connect_timeout: Duration,
    /// TCP keep-alive probe interval, `None` disables keep-alive probes
    pub tcp_keepalive: Option<Duration>,
    /// How long an idle pooled connection is kept for reuse
    pub pool_idle_timeout: Duration,
    /// Idle connections kept per upstream host
    pub pool_max_idle_per_host: usize,
    /// Cache DNS lookups, `None` uses the system resolver directly
    pub dns_cache: Option<DnsCacheConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(40),
            connect_timeout: Duration::from_secs(1),
            tcp_keepalive: None,
            pool_idle_timeout: Duration::from_secs(1),
            pool_max_idle_per_host: 1,
            dns_cache: Some(DnsCacheConfig::default()),
        }
    }
}

/// reqwest-backed upstream transport
///
/// Built once at startup; the connection pool and DNS cache inside are shared
/// by every dispatch.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(config: TransportConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_keepalive(config.tcp_keepalive)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none());

        if let Some(dns) = &config.dns_cache {
            builder = builder.dns_resolver(Arc::new(CachingResolver::new(dns.clone())));
            info!(
                "Using DNS cache (refresh {:?}, lookup timeout {:?})",
                dns.refresh_interval, dns.lookup_timeout
            );
        }

        let client = builder
            .build()
            .map_err(|e| ProxyError::Configuration(e.to_string()))?;

        info!(
            "Created upstream client (timeout {:?}, connect timeout {:?})",
            config.request_timeout, config.connect_timeout
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<UpstreamResponse, ProxyError> {
        let request = reqwest::Request::try_from(request)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
