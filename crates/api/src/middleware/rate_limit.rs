//! Rate limiting using Redis for distributed counting.
//!
//! Uses a fixed window counter pattern with Redis INCR + EXPIRE.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use redis::Client as RedisClient;
use tracing::{debug, warn};

/// Rate limit configuration per endpoint category.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Contact form submissions: (max requests, window duration)
    pub contact: (u32, Duration),
    /// CSRF token requests
    pub token: (u32, Duration),
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            contact: (5, Duration::from_secs(600)), // 5 per 10 minutes
            token: (30, Duration::from_secs(60)),   // 30 per minute
        }
    }
}

/// Endpoint category for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCategory {
    Contact,
    Token,
}

impl RateCategory {
    fn as_str(self) -> &'static str {
        match self {
            RateCategory::Contact => "contact",
            RateCategory::Token => "token",
        }
    }
}

/// Rate limiter using Redis for distributed counting.
#[derive(Clone)]
pub struct RateLimiter {
    redis: RedisClient,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(redis: RedisClient, config: RateLimitConfig) -> Self {
        Self { redis, config }
    }

    /// Check if a request should be rate limited.
    ///
    /// Returns Ok(()) if allowed, Err with retry-after seconds if limited.
    pub async fn check(&self, category: RateCategory, identifier: &str) -> Result<(), u64> {
        let (limit, window) = self.get_limit(category);
        let key = rate_key(category, identifier);
        let window_secs = window.as_secs();

        let count = match self.increment(&key, window_secs).await {
            Ok(c) => c,
            Err(e) => {
                // If Redis fails, allow the request (fail open)
                warn!(error = %e, "rate limit check failed, allowing request");
                return Ok(());
            }
        };

        let verdict = limit_verdict(count, limit, window_secs);
        if verdict.is_err() {
            debug!(
                category = category.as_str(),
                identifier = identifier,
                count = count,
                limit = limit,
                "rate limit exceeded"
            );
        }
        verdict
    }

    /// Check whether Redis is reachable.
    pub async fn healthy(&self) -> bool {
        let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await else {
            return false;
        };
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }

    fn get_limit(&self, category: RateCategory) -> (u32, Duration) {
        match category {
            RateCategory::Contact => self.config.contact,
            RateCategory::Token => self.config.token,
        }
    }

    /// Increment the counter and return the new value.
    ///
    /// Uses a Lua script to atomically INCR + EXPIRE, preventing a race
    /// where a crash between the two commands creates an immortal counter.
    async fn increment(&self, key: &str, ttl_secs: u64) -> Result<i64, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let script = redis::Script::new(
            r"local count = redis.call('INCR', KEYS[1])
              if count == 1 then
                redis.call('EXPIRE', KEYS[1], ARGV[1])
              end
              return count",
        );

        let count: i64 = script
            .key(key)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;

        Ok(count)
    }
}

/// Allow while the window's count is within `limit`, else report the window
/// length as the retry-after.
fn limit_verdict(count: i64, limit: u32, window_secs: u64) -> Result<(), u64> {
    if count > i64::from(limit) {
        Err(window_secs)
    } else {
        Ok(())
    }
}

fn rate_key(category: RateCategory, identifier: &str) -> String {
    format!("rate:{}:{identifier}", category.as_str())
}

/// Get the client address used for CAPTCHA checks and rate-limit keys.
///
/// The TCP peer is authoritative. Proxy headers are read only when the
/// peer is one of `trusted_proxies`; `X-Forwarded-For` is then walked from
/// the right, skipping trusted hops, so entries a client prepends are
/// never used. Without a peer address there is no client id.
pub fn get_client_id(
    addr: Option<SocketAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[IpAddr],
) -> Option<String> {
    let peer = addr?.ip();
    if !trusted_proxies.contains(&peer) {
        return Some(peer.to_string());
    }

    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
    {
        for hop in value.rsplit(',').map(str::trim) {
            match hop.parse::<IpAddr>() {
                Ok(ip) if trusted_proxies.contains(&ip) => continue,
                Ok(ip) => return Some(ip.to_string()),
                Err(_) => {
                    debug!(hop, "unparseable X-Forwarded-For entry");
                    return Some(peer.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && let Ok(ip) = value.trim().parse::<IpAddr>()
    {
        return Some(ip.to_string());
    }

    Some(peer.to_string())
}

/// Rate limit exceeded response.
pub fn rate_limit_response(retry_after: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            ("retry-after", retry_after.to_string()),
            ("content-type", "application/json".to_string()),
        ],
        format!(r#"{{"error":"Rate limit exceeded","retry_after":{retry_after}}}"#),
    )
        .into_response()
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_key() {
        assert_eq!(
            rate_key(RateCategory::Contact, "203.0.113.7"),
            "rate:contact:203.0.113.7"
        );
        assert_eq!(rate_key(RateCategory::Token, "::1"), "rate:token:::1");
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.contact.0, 5);
        assert_eq!(config.token.0, 30);
    }

    fn proxy() -> Vec<IpAddr> {
        vec!["10.0.0.1".parse().unwrap()]
    }

    #[test]
    fn client_id_ignores_headers_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "6.6.6.6".parse().unwrap());
        headers.insert("x-real-ip", "7.7.7.7".parse().unwrap());
        let addr = Some("192.0.2.10:4000".parse().unwrap());

        assert_eq!(get_client_id(addr, &headers, &[]).as_deref(), Some("192.0.2.10"));
        assert_eq!(
            get_client_id(addr, &headers, &proxy()).as_deref(),
            Some("192.0.2.10")
        );
    }

    #[test]
    fn client_id_walks_forwarded_for_behind_trusted_proxy() {
        let mut headers = HeaderMap::new();
        // Leftmost entry is whatever the client sent; the proxy appended the rest.
        headers.insert(
            "x-forwarded-for",
            "6.6.6.6, 198.51.100.1, 10.0.0.1".parse().unwrap(),
        );
        let addr = Some("10.0.0.1:4000".parse().unwrap());
        assert_eq!(
            get_client_id(addr, &headers, &proxy()).as_deref(),
            Some("198.51.100.1")
        );
    }

    #[test]
    fn client_id_uses_real_ip_behind_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        let addr = Some("10.0.0.1:4000".parse().unwrap());
        assert_eq!(
            get_client_id(addr, &headers, &proxy()).as_deref(),
            Some("198.51.100.2")
        );

        headers.insert("x-real-ip", "not-an-address".parse().unwrap());
        assert_eq!(
            get_client_id(addr, &headers, &proxy()).as_deref(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn client_id_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let addr = Some("127.0.0.1:4000".parse().unwrap());
        assert_eq!(get_client_id(addr, &headers, &[]).as_deref(), Some("127.0.0.1"));
        assert_eq!(get_client_id(None, &headers, &proxy()), None);
    }

    #[test]
    fn verdict_limits_after_count_exceeds_limit() {
        assert_eq!(limit_verdict(1, 5, 600), Ok(()));
        assert_eq!(limit_verdict(5, 5, 600), Ok(()));
        assert_eq!(limit_verdict(6, 5, 600), Err(600));
    }

    #[tokio::test]
    async fn unreachable_redis_fails_open() {
        // Nothing listens on port 1; opening the client does not connect.
        let redis = RedisClient::open("redis://127.0.0.1:1/").unwrap();
        let limiter = RateLimiter::new(redis, RateLimitConfig::default());

        for _ in 0..10 {
            assert_eq!(limiter.check(RateCategory::Contact, "192.0.2.10").await, Ok(()));
        }
        assert!(!limiter.healthy().await);
    }

    #[test]
    fn limited_response_sets_retry_after() {
        let response = rate_limit_response(600);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "600");
    }
}
