//! Rate limiter for sign-in attempts
//!
//! Two sliding windows guard `POST /api/auth/signin`:
//! - per client IP, every request counts (10 per minute)
//! - per login identifier, only failures count (5 per 15 minutes)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Timestamps of recent events per key, pruned on access
struct SlidingWindow<K> {
    window: Duration,
    limit: usize,
    events: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(window: Duration, limit: usize) -> Self {
        Self {
            window,
            limit,
            events: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut events = self.events.write().await;
        match events.get_mut(key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limit
            }
            None => false,
        }
    }

    async fn record(&self, key: K, now: DateTime<Utc>) {
        self.events.write().await.entry(key).or_default().push(now);
    }

    async fn reset(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    async fn prune(&self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        self.events.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

/// Sign-in rate limiter shared by all requests
pub struct LoginRateLimiter {
    by_identifier: SlidingWindow<String>,
    by_ip: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(5, Duration::minutes(15), 10, Duration::minutes(1))
    }

    pub fn with_limits(
        identifier_failures: usize,
        identifier_window: Duration,
        ip_requests: usize,
        ip_window: Duration,
    ) -> Self {
        Self {
            by_identifier: SlidingWindow::new(identifier_window, identifier_failures),
            by_ip: SlidingWindow::new(ip_window, ip_requests),
        }
    }

    /// Username or email, case-insensitive
    pub async fn is_identifier_limited(&self, identifier: &str) -> bool {
        self.by_identifier
            .is_limited(&identifier.to_lowercase(), Utc::now())
            .await
    }

    pub async fn record_failed_attempt(&self, identifier: &str) {
        self.by_identifier
            .record(identifier.to_lowercase(), Utc::now())
            .await;
    }

    /// Forget failures after a successful sign-in
    pub async fn clear_identifier(&self, identifier: &str) {
        self.by_identifier.reset(&identifier.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.by_ip.is_limited(&ip, Utc::now()).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.by_ip.record(ip, Utc::now()).await;
    }

    /// Drop expired entries; run periodically from a background task
    pub async fn cleanup(&self) {
        let now = Utc::now();
        self.by_identifier.prune(now).await;
        self.by_ip.prune(now).await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_identifier_limit_and_reset() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            limiter.record_failed_attempt("reader").await;
        }
        assert!(!limiter.is_identifier_limited("reader").await);

        limiter.record_failed_attempt("READER").await;
        assert!(limiter.is_identifier_limited("Reader").await);

        limiter.clear_identifier("reader").await;
        assert!(!limiter.is_identifier_limited("reader").await);
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("10.0.0.7").unwrap();
        let other = IpAddr::from_str("10.0.0.8").unwrap();

        for _ in 0..10 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        assert!(limiter.is_ip_limited(ip).await);
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_window_expiry_and_cleanup() {
        let limiter = LoginRateLimiter::with_limits(1, Duration::milliseconds(20), 1, Duration::milliseconds(20));
        limiter.record_failed_attempt("a@example.com").await;
        assert!(limiter.is_identifier_limited("a@example.com").await);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!limiter.is_identifier_limited("a@example.com").await);

        limiter.record_failed_attempt("b@example.com").await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        limiter.cleanup().await;
        assert!(limiter.by_identifier.events.read().await.is_empty());
    }
}
