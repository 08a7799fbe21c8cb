use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use hearth_core::counter::CounterStore;

use crate::error::AppError;

/// Proxy headers consulted for the client address, most trusted first. The
/// first comma-separated value that parses as an IP wins; anything else
/// falls through to the peer address, then to the unknown sentinel.
const IP_HEADERS: &[&str] = &[
    "client-ip",
    "x-forwarded-for",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

const UNKNOWN_IP: &str = "0.0.0.0";

/// Fixed-window admission control per (client IP, endpoint).
///
/// The counter store is injected at construction: Redis in normal
/// operation, the file-backed store when Redis is unreachable, an
/// in-memory fake under test.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limit: u32, window: Duration) -> Self {
        Self { store, limit, window }
    }

    /// Seconds until the window for `key` resets; used for `Retry-After`.
    async fn retry_after_secs(&self, key: &str) -> u64 {
        match self.store.ttl(key).await {
            Ok(Some(ttl)) => ttl.as_secs().min(self.window.as_secs()),
            Ok(None) => self.window.as_secs(),
            Err(_) => self.window.as_secs(),
        }
    }

    pub async fn check(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, AppError> {
        let ip = client_ip(&req);
        let endpoint = endpoint_of(req.uri().path());
        let key = format!("ratelimit:{}:{}", ip, endpoint);

        // Budget is checked before the increment, so rejected requests do
        // not consume it.
        let count = match self.store.get(&key).await {
            Ok(count) => count,
            Err(e) => {
                // A broken counter store must never take the API down.
                tracing::warn!("rate limit store unavailable, failing open: {}", e);
                return Ok(next.run(req).await);
            }
        };

        if count >= u64::from(self.limit) {
            let retry_after_secs = self.retry_after_secs(&key).await;
            tracing::debug!(%key, count, "rate limit exceeded");
            return Err(AppError::TooManyRequests { retry_after_secs });
        }

        if let Err(e) = self.store.incr(&key, self.window).await {
            tracing::warn!("rate limit increment failed, failing open: {}", e);
        }

        Ok(next.run(req).await)
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check(req, next).await
}

/// Derive the client IP from proxy headers, falling back to the connection
/// peer, then to `0.0.0.0`.
fn client_ip(req: &Request<Body>) -> String {
    for header in IP_HEADERS {
        let Some(value) = req.headers().get(*header).and_then(|h| h.to_str().ok()) else {
            continue;
        };
        let Some(first) = value.split(',').map(str::trim).find(|s| !s.is_empty()) else {
            continue;
        };
        if first.parse::<IpAddr>().is_ok() {
            return first.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// Endpoint identifier for the counter key: the leading path segment under
/// `/v1`, so each resource gets its own budget.
fn endpoint_of(path: &str) -> &str {
    let path = path.strip_prefix("/v1").unwrap_or(path);
    let segment = path.trim_start_matches('/').split('/').next().unwrap_or("");
    if segment.is_empty() {
        "root"
    } else {
        segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(name: &str, value: &str) -> Request<Body> {
        Request::builder()
            .uri("/v1/properties")
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_forwarded_for_first_value_wins() {
        let req = request_with_header("x-forwarded-for", "203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn test_invalid_header_value_falls_through() {
        let req = request_with_header("x-forwarded-for", "not-an-ip");
        // No peer info on a hand-built request either.
        assert_eq!(client_ip(&req), UNKNOWN_IP);
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut req = Request::builder()
            .uri("/v1/properties")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 4321))));
        assert_eq!(client_ip(&req), "198.51.100.7");
    }

    #[test]
    fn test_header_outranks_peer_address() {
        let mut req = request_with_header("client-ip", "203.0.113.9");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 4321))));
        assert_eq!(client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn test_endpoint_extraction() {
        assert_eq!(endpoint_of("/v1/properties"), "properties");
        assert_eq!(endpoint_of("/v1/reservations/abc/cancel"), "reservations");
        assert_eq!(endpoint_of("/v1"), "root");
        assert_eq!(endpoint_of("/"), "root");
    }
}
