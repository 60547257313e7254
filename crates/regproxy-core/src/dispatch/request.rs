//! Materialized inbound requests

use bytes::Bytes;
use http::uri::PathAndQuery;
use http::{HeaderMap, Method, Request, Uri, Version};
use http_body::Body;
use http_body_util::BodyExt;
use regproxy_proxy::ProxyError;
use url::Url;

use crate::error::CoreError;
use crate::headers::outbound_headers;

/// An inbound request with its body read into memory.
///
/// The body is replayed to every upstream, so it has to outlive the
/// single-use stream it arrived on. `Bytes` clones share one buffer.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
        }
    }

    /// Read the whole body of `request`
    pub async fn materialize<B>(request: Request<B>) -> Result<Self, CoreError>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| CoreError::RequestBody(e.to_string()))?
            .to_bytes();

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        })
    }

    /// Path of the inbound request, for logs
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Copy of this request aimed at `target`.
    ///
    /// Scheme, host and port come from the upstream; path and query are the
    /// inbound ones, byte for byte. The upstream URL's own path is ignored.
    pub fn retarget(&self, target: &Url) -> Result<Request<Bytes>, ProxyError> {
        let host = target.host_str().ok_or_else(|| {
            ProxyError::InvalidRequest(format!("upstream url {} has no host", target))
        })?;
        let authority = match target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path_and_query = self
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let uri = Uri::builder()
            .scheme(target.scheme())
            .authority(authority.as_str())
            .path_and_query(path_and_query.as_str())
            .build()
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        let mut request = Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = uri;
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = outbound_headers(&self.headers);

        Ok(request)
    }
}
