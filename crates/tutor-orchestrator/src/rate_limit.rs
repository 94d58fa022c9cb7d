//! Per-client admission control for the chat endpoints.
//!
//! Clients are keyed by peer IP when the server was started with connect
//! info, and share a single `anonymous` bucket otherwise. Clients whose
//! bucket has fully refilled are forgotten every [`PRUNE_INTERVAL`] checks.

use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use crate::api::ErrorResponse;

/// Key used when the peer address is unknown.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Body of the 429 response.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests";

/// Number of checks between sweeps of idle client keys.
pub const PRUNE_INTERVAL: u64 = 1024;

/// Keyed limiter allowing a fixed number of requests per client per minute.
pub struct ClientRateLimiter {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    requests_per_minute: u32,
    checks: AtomicU64,
}

impl ClientRateLimiter {
    /// Creates a limiter; `0` disables it.
    #[must_use]
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_minute)
            .map(|burst| RateLimiter::keyed(Quota::per_minute(burst)));
        Self {
            limiter,
            requests_per_minute,
            checks: AtomicU64::new(0),
        }
    }

    /// A limiter that admits everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::per_minute(0)
    }

    /// Returns `true` if requests are being limited.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Configured requests per minute.
    #[must_use]
    pub const fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Records one request for `client`; returns `false` if it must be rejected.
    pub fn check(&self, client: &str) -> bool {
        let Some(limiter) = &self.limiter else {
            return true;
        };

        let admitted = limiter.check_key(&client.to_string()).is_ok();
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
            self.prune();
        }
        admitted
    }

    /// Drops clients whose bucket has fully refilled.
    pub fn prune(&self) {
        if let Some(limiter) = &self.limiter {
            let before = limiter.len();
            limiter.retain_recent();
            limiter.shrink_to_fit();
            debug!(before, after = limiter.len(), "Pruned idle rate-limit keys");
        }
    }

    /// Number of clients currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }
}

impl fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRateLimiter")
            .field("requests_per_minute", &self.requests_per_minute)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Identifies the caller of a request.
#[must_use]
pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(
            || ANONYMOUS_CLIENT.to_string(),
            |ConnectInfo(addr)| addr.ip().to_string(),
        )
}

/// Middleware rejecting clients over their quota with `429`.
pub async fn rate_limit(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    if limiter.check(&client) {
        return next.run(request).await;
    }

    warn!(
        client = %client,
        path = %request.uri().path(),
        limit = limiter.requests_per_minute(),
        "Rate limit exceeded"
    );

    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "60")],
        Json(ErrorResponse {
            error: RATE_LIMITED_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use axum::body::Body;

    use super::*;

    #[test]
    fn test_limiter_admits_up_to_quota() {
        let limiter = ClientRateLimiter::per_minute(3);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let limiter = ClientRateLimiter::per_minute(1);
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn test_zero_disables_limiter() {
        let limiter = ClientRateLimiter::disabled();
        assert!(!limiter.is_enabled());
        for _ in 0..1000 {
            assert!(limiter.check(ANONYMOUS_CLIENT));
        }
    }

    #[test]
    fn test_prune_forgets_refilled_clients() {
        // One cell per millisecond, so a single request refills almost at once.
        let limiter = ClientRateLimiter::per_minute(60_000);
        for i in 0..100 {
            assert!(limiter.check(&format!("10.0.0.{i}")));
        }
        assert_eq!(limiter.tracked_clients(), 100);

        std::thread::sleep(std::time::Duration::from_millis(20));
        limiter.prune();

        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_checks_prune_stale_clients_periodically() {
        let limiter = ClientRateLimiter::per_minute(60_000);
        for i in 0..10 {
            assert!(limiter.check(&format!("10.0.1.{i}")));
        }
        std::thread::sleep(std::time::Duration::from_millis(20));

        for _ in 10..PRUNE_INTERVAL {
            assert!(limiter.check("10.0.2.1"));
        }

        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_prune_keeps_limited_clients() {
        let limiter = ClientRateLimiter::per_minute(1);
        assert!(limiter.check("10.0.0.1"));
        limiter.prune();
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_client_key_uses_peer_ip() {
        let mut request = Request::new(Body::empty());
        assert_eq!(client_key(&request), ANONYMOUS_CLIENT);

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)), 51234);
        request.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&request), "192.168.1.7");
    }

    #[test]
    fn test_debug_hides_internal_state() {
        let rendered = format!("{:?}", ClientRateLimiter::per_minute(30));
        assert!(rendered.contains("requests_per_minute: 30"));
        assert!(rendered.contains("enabled: true"));
    }
}
