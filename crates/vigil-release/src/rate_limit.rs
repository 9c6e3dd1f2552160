//! Sliding-window rate limiter for the processing entry point.
//!
//! Each caller key keeps the instants of its admitted requests. A request is
//! admitted only while fewer than `max_requests` instants fall inside the
//! trailing window; rejected requests leave no trace. State is process-local.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Rate limiter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Admitted requests per key within one window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// Run a cleanup pass every N calls
    pub cleanup_interval: u64,
    /// Hard cap on distinct keys held in memory
    pub max_tracked_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
            cleanup_interval: 100,
            max_tracked_keys: 10_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Identity a request is rate limited under, usually the client address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerKey(String);

impl CallerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key used when the caller cannot be identified.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<std::net::IpAddr> for CallerKey {
    fn from(value: std::net::IpAddr) -> Self {
        Self(value.to_string())
    }
}

/// Per-key sliding window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: RwLock<HashMap<CallerKey, Vec<Instant>>>,
    calls: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject a request arriving now.
    pub fn allow(&self, key: &CallerKey) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Admit or reject a request arriving at `now`.
    pub fn allow_at(&self, key: &CallerKey, now: Instant) -> bool {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.cleanup_interval > 0 && calls % self.config.cleanup_interval == 0 {
            self.cleanup_at(now);
        }

        let cutoff = now.checked_sub(self.config.window());
        let limit = self.config.max_requests as usize;

        let mut state = self.state.write();

        if !state.contains_key(key) && state.len() >= self.config.max_tracked_keys {
            Self::retain_recent(&mut state, cutoff);
            if state.len() >= self.config.max_tracked_keys {
                tracing::warn!(
                    caller = %key,
                    tracked = state.len(),
                    "rate limiter key table full; rejecting new caller"
                );
                return false;
            }
        }

        let instants = state.entry(key.clone()).or_default();
        if let Some(cutoff) = cutoff {
            instants.retain(|&t| t > cutoff);
        }

        if instants.len() >= limit {
            tracing::debug!(caller = %key, in_window = instants.len(), "rate limit exceeded");
            if instants.is_empty() {
                state.remove(key);
            }
            return false;
        }

        instants.push(now);
        true
    }

    /// Drop keys with no admitted request inside the current window.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let cutoff = now.checked_sub(self.config.window());
        let mut state = self.state.write();
        Self::retain_recent(&mut state, cutoff);
    }

    fn retain_recent(state: &mut HashMap<CallerKey, Vec<Instant>>, cutoff: Option<Instant>) {
        state.retain(|_, instants| {
            if let Some(cutoff) = cutoff {
                instants.retain(|&t| t > cutoff);
            }
            !instants.is_empty()
        });
    }

    /// Number of keys currently held.
    pub fn tracked_keys(&self) -> usize {
        self.state.read().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window_secs,
            ..Default::default()
        })
    }

    #[test]
    fn test_allows_requests_within_limit() {
        let limiter = limiter(5, 60);
        let key = CallerKey::from("10.0.0.1");
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(&key, now));
        }
        assert!(!limiter.allow_at(&key, now));
    }

    #[test]
    fn test_twenty_first_request_in_window_is_rejected() {
        let limiter = RateLimiter::default();
        let key = CallerKey::from("10.0.0.1");
        let start = Instant::now();
        for i in 0..20 {
            assert!(limiter.allow_at(&key, start + Duration::from_secs(i)));
        }
        assert!(!limiter.allow_at(&key, start + Duration::from_secs(59)));
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, 60);
        let key = CallerKey::from("10.0.0.1");
        let start = Instant::now();
        assert!(limiter.allow_at(&key, start));
        assert!(limiter.allow_at(&key, start + Duration::from_secs(30)));
        assert!(!limiter.allow_at(&key, start + Duration::from_secs(45)));
        // First instant leaves the window.
        assert!(limiter.allow_at(&key, start + Duration::from_secs(61)));
        assert!(!limiter.allow_at(&key, start + Duration::from_secs(62)));
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let limiter = limiter(1, 60);
        let key = CallerKey::from("10.0.0.1");
        let start = Instant::now();
        assert!(limiter.allow_at(&key, start));
        for i in 1..10 {
            assert!(!limiter.allow_at(&key, start + Duration::from_secs(i)));
        }
        // Only the admitted instant counts; it expires at +60s.
        assert!(limiter.allow_at(&key, start + Duration::from_secs(61)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.allow_at(&CallerKey::from("a"), now));
        assert!(!limiter.allow_at(&CallerKey::from("a"), now));
        assert!(limiter.allow_at(&CallerKey::from("b"), now));
    }

    #[test]
    fn test_cleanup_drops_idle_keys() {
        let limiter = limiter(10, 60);
        let start = Instant::now();
        for i in 0..5 {
            assert!(limiter.allow_at(&CallerKey::new(format!("k{i}")), start));
        }
        assert_eq!(limiter.tracked_keys(), 5);
        limiter.cleanup_at(start + Duration::from_secs(120));
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_periodic_cleanup_runs_on_interval() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 10,
            window_secs: 1,
            cleanup_interval: 3,
            max_tracked_keys: 100,
        });
        let start = Instant::now();
        assert!(limiter.allow_at(&CallerKey::from("a"), start));
        assert!(limiter.allow_at(&CallerKey::from("b"), start));
        // Third call triggers cleanup before recording "c".
        assert!(limiter.allow_at(&CallerKey::from("c"), start + Duration::from_secs(5)));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_key_cap_rejects_new_callers_when_full() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 10,
            window_secs: 60,
            cleanup_interval: 0,
            max_tracked_keys: 2,
        });
        let start = Instant::now();
        assert!(limiter.allow_at(&CallerKey::from("a"), start));
        assert!(limiter.allow_at(&CallerKey::from("b"), start));
        assert!(!limiter.allow_at(&CallerKey::from("c"), start));
        // Known keys are still served.
        assert!(limiter.allow_at(&CallerKey::from("a"), start));
        // Once the window passes the cap frees up.
        assert!(limiter.allow_at(&CallerKey::from("c"), start + Duration::from_secs(61)));
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 20);
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.cleanup_interval, 100);
        assert_eq!(config.max_tracked_keys, 10_000);
    }
}
