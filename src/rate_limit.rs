// ============================================================================
// Rate Limiter Policy
// ============================================================================
//
// Per-caller request budgets over a fixed counting window:
// - RateLimitIdentity: API key when supplied, else the normalized client
//   address (IPv6 variants of one client collapse to one bucket)
// - RateLimitStore: injected counter store with atomic check-and-increment
// - RateLimiter: applies the authenticated/anonymous budget split
//
// The gateway runs this before proxy dispatch, so budgets hold uniformly
// regardless of which backend would have served the request.
//
// ============================================================================

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use storefront_config::RateLimitConfig;

use crate::utils::extract_client_ip;

/// The key a caller's budget is counted against. One request's lifetime only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitIdentity(String);

impl RateLimitIdentity {
    pub fn key(&self) -> &str {
        &self.0
    }

    /// Derive the counting identity for a request.
    ///
    /// An explicit API key wins (the apiKey query parameter, then the
    /// x-api-key header); otherwise the client address. The key is taken at
    /// face value, as the original edge did.
    pub fn from_request(
        query: Option<&str>,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> Self {
        if let Some(key) = query.and_then(api_key_from_query) {
            return Self(format!("key:{}", key));
        }
        if let Some(key) = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            return Self(format!("key:{}", key));
        }
        let ip = extract_client_ip(headers, peer);
        Self(format!("ip:{}", normalize_client_ip(&ip)))
    }
}

fn api_key_from_query(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    pairs
        .into_iter()
        .find(|(name, value)| name == "apiKey" && !value.is_empty())
        .map(|(_, value)| value)
}

/// Collapse address variants that represent the same client to one bucket:
/// v4-mapped v6 becomes plain v4, native v6 is keyed on its /64 prefix.
fn normalize_client_ip(raw: &str) -> String {
    match raw.parse::<IpAddr>() {
        Ok(addr) => match addr.to_canonical() {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => {
                let seg = v6.segments();
                let prefix = Ipv6Addr::new(seg[0], seg[1], seg[2], seg[3], 0, 0, 0, 0);
                format!("{}/64", prefix)
            }
        },
        Err(_) => raw.to_string(),
    }
}

/// Does this request carry an authenticated-user context?
///
/// Presence of an Authorization header or of the configured session cookie.
/// Both are self-asserted at this layer; verification belongs to the auth
/// backend behind the gateway.
pub fn has_authenticated_context(headers: &HeaderMap, session_cookie: &str) -> bool {
    if headers.contains_key(header::AUTHORIZATION) {
        return true;
    }
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|cookies| {
            cookies.split(';').any(|cookie| {
                cookie
                    .trim()
                    .split_once('=')
                    .map(|(name, _)| name.ends_with(session_cookie))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

/// Counter state for one identity's current window
#[derive(Clone, Copy, Debug)]
pub struct WindowUsage {
    pub count: u64,
    pub reset_after: Duration,
}

/// Injected counter store. The check-and-increment must be atomic per key;
/// it is the only shared mutable state in the gateway.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check_and_increment(&self, key: &str, window: Duration) -> WindowUsage;
}

/// Fixed-window counters held in process memory
#[derive(Default)]
pub struct InMemoryStore {
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    count: u64,
    started: Instant,
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn check_and_increment(&self, key: &str, window: Duration) -> WindowUsage {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        entry.count += 1;
        WindowUsage {
            count: entry.count,
            reset_after: window.saturating_sub(now.duration_since(entry.started)),
        }
    }
}

/// Outcome of one budget check, also feeding the rate-limit response headers
#[derive(Clone, Copy, Debug)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_secs: u64,
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryStore::default()), config)
    }

    /// Count this request and decide whether it is within budget
    pub async fn check(
        &self,
        identity: &RateLimitIdentity,
        authenticated: bool,
    ) -> RateLimitDecision {
        let limit = if authenticated {
            self.config.authenticated_max
        } else {
            self.config.anonymous_max
        };
        let usage = self
            .store
            .check_and_increment(identity.key(), Duration::from_secs(self.config.window_secs))
            .await;

        RateLimitDecision {
            allowed: usage.count <= limit,
            limit,
            remaining: limit.saturating_sub(usage.count),
            reset_secs: usage.reset_after.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            window_secs: 900,
            authenticated_max: 1000,
            anonymous_max: 100,
        }
    }

    fn identity(key: &str) -> RateLimitIdentity {
        RateLimitIdentity(key.to_string())
    }

    #[test]
    fn test_api_key_wins_over_address() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.1:4242".parse().unwrap();

        let id = RateLimitIdentity::from_request(Some("apiKey=secret-1"), &headers, Some(peer));
        assert_eq!(id.key(), "key:secret-1");

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "secret-2".parse().unwrap());
        let id = RateLimitIdentity::from_request(None, &headers, Some(peer));
        assert_eq!(id.key(), "key:secret-2");

        let id = RateLimitIdentity::from_request(None, &HeaderMap::new(), Some(peer));
        assert_eq!(id.key(), "ip:192.0.2.1");
    }

    #[test]
    fn test_ipv6_variants_share_a_bucket() {
        // v4-mapped v6 collapses to the plain v4 key
        assert_eq!(normalize_client_ip("::ffff:192.0.2.1"), "192.0.2.1");
        assert_eq!(normalize_client_ip("192.0.2.1"), "192.0.2.1");

        // Hosts within one /64 count together
        let a = normalize_client_ip("2001:db8:1:2:aaaa::1");
        let b = normalize_client_ip("2001:db8:1:2:bbbb::2");
        assert_eq!(a, b);
        assert_eq!(a, "2001:db8:1:2::/64");

        // Different /64s stay apart
        assert_ne!(
            normalize_client_ip("2001:db8:1:2::1"),
            normalize_client_ip("2001:db8:1:3::1")
        );
    }

    #[test]
    fn test_authenticated_context_detection() {
        let mut headers = HeaderMap::new();
        assert!(!has_authenticated_context(&headers, "session_token"));

        headers.insert(header::COOKIE, "theme=dark; app.session_token=abc".parse().unwrap());
        assert!(has_authenticated_context(&headers, "session_token"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert!(has_authenticated_context(&headers, "session_token"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark".parse().unwrap());
        assert!(!has_authenticated_context(&headers, "session_token"));
    }

    #[tokio::test]
    async fn test_anonymous_budget_denies_request_101() {
        let limiter = RateLimiter::in_memory(config());
        let id = identity("ip:192.0.2.9");

        for n in 1..=100u64 {
            let decision = limiter.check(&id, false).await;
            assert!(decision.allowed, "request {} should pass", n);
        }
        let decision = limiter.check(&id, false).await;
        assert!(!decision.allowed);
        assert_eq!(decision.limit, 100);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_authenticated_budget_denies_request_1001() {
        let limiter = RateLimiter::in_memory(config());
        let id = identity("key:caller");

        for _ in 0..1000u64 {
            assert!(limiter.check(&id, true).await.allowed);
        }
        assert!(!limiter.check(&id, true).await.allowed);
    }

    #[tokio::test]
    async fn test_identities_count_independently() {
        let limiter = RateLimiter::in_memory(config());
        for _ in 0..100u64 {
            assert!(limiter.check(&identity("ip:a"), false).await.allowed);
        }
        assert!(!limiter.check(&identity("ip:a"), false).await.allowed);
        assert!(limiter.check(&identity("ip:b"), false).await.allowed);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_the_counter() {
        let limiter = RateLimiter::in_memory(RateLimitConfig {
            window_secs: 0,
            authenticated_max: 1000,
            anonymous_max: 1,
        });
        let id = identity("ip:short");

        assert!(limiter.check(&id, false).await.allowed);
        // A zero-length window has always expired, so every request starts
        // a fresh count
        assert!(limiter.check(&id, false).await.allowed);
    }

    #[tokio::test]
    async fn test_counters_are_atomic_under_concurrency() {
        let limiter = Arc::new(RateLimiter::in_memory(config()));
        let id = identity("ip:race");

        let mut handles = Vec::new();
        for _ in 0..100 {
            let limiter = limiter.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { limiter.check(&id, false).await }));
        }
        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().allowed {
                allowed += 1;
            }
        }
        // Every one of the 100 concurrent requests fits the anonymous budget
        // exactly; a lost update would overshoot
        assert_eq!(allowed, 100);
        assert!(!limiter.check(&id, false).await.allowed);
    }
}
