//! Process-wide fixed-window rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time-windowed counter keyed by client identity.
///
/// The counter resets on each window rollover; exceeding the limit
/// fails the request before any state is touched.
pub struct RateLimiter {
    max: u32,
    window: Duration,
    counters: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `key`; false means over the limit.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut counters = self.counters.lock().expect("poisoned");
        let entry = counters.entry(key.to_string()).or_insert((now, 0));

        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        if entry.1 >= self.max {
            return false;
        }
        entry.1 += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_within_a_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("client-a"));
        }
        assert!(!limiter.check("client-a"));
        // other keys are unaffected
        assert!(limiter.check("client-b"));
    }

    #[test]
    fn resets_on_window_rollover() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("client-a"));
        assert!(!limiter.check("client-a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("client-a"));
    }
}
