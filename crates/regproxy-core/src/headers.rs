//! Header hygiene for forwarded requests and relayed responses

use http::HeaderMap;
use http::header::{
    CONNECTION, CONTENT_LENGTH, HOST, HeaderName, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE,
    TRAILER, TRANSFER_ENCODING, UPGRADE,
};

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }

    for name in [
        CONNECTION,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// Headers for an outbound copy of the inbound request.
///
/// `Host` and `Content-Length` are left to the transport, which derives them
/// from the upstream URL and the materialized body.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    headers
}

/// Headers to relay from the selected upstream response.
///
/// The body has already been read in full, so framing is recomputed by the
/// server when the response is written.
pub fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(CONTENT_LENGTH);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_outbound_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("proxy.local:9876"));
        inbound.insert(CONTENT_LENGTH, HeaderValue::from_static("7"));
        inbound.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        inbound.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        inbound.insert("x-session", HeaderValue::from_static("abc"));
        inbound.insert("x-command", HeaderValue::from_static("reload"));
        inbound.insert("content-type", HeaderValue::from_static("application/json"));

        let outbound = outbound_headers(&inbound);

        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound.get("x-command").unwrap(), "reload");
        assert_eq!(outbound.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_relayed_headers_keep_end_to_end() {
        let mut upstream = HeaderMap::new();
        upstream.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        upstream.insert("x-upstream", HeaderValue::from_static("a"));

        let relayed = relayed_headers(&upstream);

        assert_eq!(relayed.len(), 1);
        assert_eq!(relayed.get("x-upstream").unwrap(), "a");
    }
}
