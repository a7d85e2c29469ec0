//! Plain HTTP relay.
//!
//! # Responsibilities
//! - Clone method, target URL, and headers verbatim onto an outbound request
//! - Stream request and response bodies through unmodified
//! - Optionally decode gzip response bodies for inspection, stripping the
//!   encoding header exactly when the body is decoded
//!
//! # Design Decisions
//! - Header copy is additive; repeated headers (e.g. Set-Cookie) survive
//! - Bodies are never materialized except in the decode path

use std::io::Read;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use flate2::read::GzDecoder;
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::config::ProxyConfig;
use crate::observability::metrics;

/// Shared upstream HTTP client.
pub type RelayClient = Client<HttpConnector, Body>;

/// Relay behavior derived from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub decode_gzip: bool,
    pub max_decode_bytes: usize,
    pub request_timeout: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            decode_gzip: config.relay.decode_gzip,
            max_decode_bytes: config.relay.max_decode_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }
}

/// Forward one non-CONNECT request upstream and stream the response back.
pub async fn forward(
    client: &RelayClient,
    settings: &RelaySettings,
    req: Request<Incoming>,
) -> Response<Body> {
    let start = Instant::now();
    let method = req.method().to_string();

    // Tunnels are only taken over as a connection's first request; a
    // CONNECT after keep-alive traffic cannot be spliced anymore.
    if req.method() == Method::CONNECT {
        return plain(
            StatusCode::BAD_REQUEST,
            "CONNECT must be the first request on a connection",
        );
    }

    // A forward proxy is addressed with absolute-form URLs; anything else
    // has no target to dial.
    if req.uri().authority().is_none() {
        return plain(
            StatusCode::BAD_REQUEST,
            "proxy requests must carry an absolute target URL",
        );
    }

    tracing::debug!(method = %method, target = %req.uri(), "Relaying request");

    let (parts, body) = req.into_parts();
    let mut outbound = match Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .body(Body::new(body))
    {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build outbound request");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "failed to build outbound request");
        }
    };
    for (name, value) in parts.headers.iter() {
        outbound.headers_mut().append(name.clone(), value.clone());
    }

    match tokio::time::timeout(settings.request_timeout, client.request(outbound)).await {
        Ok(Ok(upstream)) => {
            let response = relay_response(upstream, settings).await;
            metrics::record_relay(&method, response.status().as_u16(), start);
            response
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Upstream request failed");
            metrics::record_relay(&method, StatusCode::BAD_GATEWAY.as_u16(), start);
            plain(StatusCode::BAD_GATEWAY, "upstream request failed")
        }
        Err(_) => {
            tracing::warn!(method = %method, "Upstream request timed out");
            metrics::record_relay(&method, StatusCode::GATEWAY_TIMEOUT.as_u16(), start);
            plain(StatusCode::GATEWAY_TIMEOUT, "upstream request timed out")
        }
    }
}

/// Pass the upstream response onward, decoding gzip bodies for inspection
/// when enabled. The Content-Encoding header (and the then-stale
/// Content-Length) is stripped exactly when the body is decoded.
async fn relay_response(upstream: Response<Incoming>, settings: &RelaySettings) -> Response<Body> {
    let (mut parts, body) = upstream.into_parts();

    let gzipped = parts
        .headers
        .get(header::CONTENT_ENCODING)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"))
        .unwrap_or(false);

    if !(settings.decode_gzip && gzipped) {
        return Response::from_parts(parts, Body::new(body));
    }

    let compressed = match axum::body::to_bytes(Body::new(body), settings.max_decode_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read upstream response body");
            return plain(StatusCode::BAD_GATEWAY, "failed to read upstream response body");
        }
    };

    match gunzip(&compressed) {
        Ok(decoded) => {
            parts.headers.remove(header::CONTENT_ENCODING);
            parts.headers.remove(header::CONTENT_LENGTH);
            tracing::debug!(
                compressed = compressed.len(),
                decoded = decoded.len(),
                "Response body decoded for inspection"
            );
            Response::from_parts(parts, Body::from(decoded))
        }
        Err(e) => {
            // Not actually gzip: forward the original bytes, headers intact.
            tracing::warn!(error = %e, "Failed to decode response body, passing through");
            Response::from_parts(parts, Body::from(compressed))
        }
    }
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut decoded)?;
    Ok(decoded)
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn gunzip_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"inspection payload").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(gunzip(&compressed).unwrap(), b"inspection payload");
    }

    #[test]
    fn gunzip_rejects_garbage() {
        assert!(gunzip(b"definitely not gzip").is_err());
    }

    #[test]
    fn plain_sets_status() {
        let response = plain(StatusCode::BAD_GATEWAY, "nope");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
