//! Sliding-window rate limiter keyed by an opaque string (a chat id, an API
//! caller's identifier, whatever the caller chooses).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Prune timestamps outside the window, then record a new request if
    /// under the limit. Returns whether the request is allowed.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_default();
        prune(bucket, now, self.window);

        if bucket.len() >= self.max_requests {
            return false;
        }
        bucket.push(now);
        true
    }

    /// Same as [`check`](Self::check), but also reports how long the caller
    /// should wait before retrying when denied, as whole seconds rounded up.
    pub fn check_with_retry(&self, key: &str) -> (bool, u64) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_default();
        prune(bucket, now, self.window);

        if bucket.len() >= self.max_requests {
            let oldest = bucket.first().copied().unwrap_or(now);
            let elapsed = now.duration_since(oldest);
            let retry_after = self.window.saturating_sub(elapsed);
            let retry_after_seconds = retry_after.as_secs().max(if retry_after.subsec_nanos() > 0 { 1 } else { 0 }).max(1);
            return (false, retry_after_seconds);
        }
        bucket.push(now);
        (true, 0)
    }

    pub fn get_remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_default();
        prune(bucket, now, self.window);
        self.max_requests.saturating_sub(bucket.len())
    }

    pub fn reset(&self, key: &str) {
        self.buckets.lock().unwrap().remove(key);
    }

    /// Drop every key whose bucket is now empty after pruning. Call
    /// periodically so long-lived callers that stop requesting don't leak
    /// map entries forever.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        for bucket in buckets.values_mut() {
            prune(bucket, now, self.window);
        }
        buckets.retain(|_, bucket| !bucket.is_empty());
    }
}

fn prune(bucket: &mut Vec<Instant>, now: Instant, window: Duration) {
    bucket.retain(|ts| now.duration_since(*ts) < window);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("chat-1"));
        assert!(limiter.check("chat-1"));
        assert!(!limiter.check("chat-1"));
    }

    #[test]
    fn different_keys_have_independent_windows() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("chat-1"));
        assert!(limiter.check("chat-2"));
    }

    #[test]
    fn reset_clears_a_keys_history() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("chat-1"));
        assert!(!limiter.check("chat-1"));
        limiter.reset("chat-1");
        assert!(limiter.check("chat-1"));
    }

    #[test]
    fn get_remaining_reflects_recorded_requests() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert_eq!(limiter.get_remaining("chat-1"), 3);
        limiter.check("chat-1");
        assert_eq!(limiter.get_remaining("chat-1"), 2);
    }

    #[test]
    fn cleanup_drops_empty_buckets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        limiter.check("chat-1");
        std::thread::sleep(Duration::from_millis(20));
        limiter.cleanup();
        assert_eq!(limiter.get_remaining("chat-1"), 1);
    }

    #[test]
    fn check_with_retry_reports_a_positive_wait_once_denied() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.check_with_retry("chat-1"), (true, 0));
        let (allowed, retry_after) = limiter.check_with_retry("chat-1");
        assert!(!allowed);
        assert!(retry_after >= 1 && retry_after <= 60);
    }
}
