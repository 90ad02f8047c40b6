//! Rate limiter (§4.7): per-IP sliding 60-second window over two buckets,
//! `auth:<ip>` for `POST /auth/token` and `api:<ip>` for everything else not
//! under `/_`, `/docs`, or `/openapi`.
//!
//! Grounded on the `DashMap`-per-key pattern `key_server/store.rs` uses for
//! its lock-free indices, rather than the teacher's `governor`-backed
//! `failsafe/rate_limiter.rs`: `governor` limits per-instance/per-key with no
//! built-in notion of "reset everything for a test", and the spec requires a
//! plain sliding window with an explicit `reset()` hook. Windowing algorithm
//! (prune-then-check-then-append) follows
//! `original_source/.../middleware/rate_limit.py`.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

/// Per-IP sliding window limiter. Process-local, non-durable (§3, §5): state
/// lives only in this struct and is lost across restarts.
pub struct RateLimiter {
    windows: DashMap<String, Mutex<Vec<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Admits one request against `key`'s window if fewer than `limit`
    /// timestamps remain after pruning entries older than 60s; otherwise
    /// rejects (429).
    #[must_use]
    pub fn check(&self, key: &str, limit: usize) -> bool {
        let now = Instant::now();
        let entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Vec::new()));
        let mut timestamps = entry.lock();
        timestamps.retain(|t| now.duration_since(*t) < WINDOW);
        if timestamps.len() >= limit {
            return false;
        }
        timestamps.push(now);
        true
    }

    /// Clears every window. Exposed for tests (§4.7).
    pub fn reset(&self) {
        self.windows.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bucket key for the auth-exchange endpoint.
#[must_use]
pub fn auth_bucket(ip: &str) -> String {
    format!("auth:{ip}")
}

/// Bucket key for every other gated path.
#[must_use]
pub fn api_bucket(ip: &str) -> String {
    format!("api:{ip}")
}

/// Whether `path` is exempt from the `api:<ip>` bucket (§4.7).
#[must_use]
pub fn is_exempt_path(path: &str) -> bool {
    path.starts_with("/_") || path.starts_with("/docs") || path.starts_with("/openapi")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        // GIVEN: a limiter with a limit of 2
        let limiter = RateLimiter::new();

        // WHEN: three requests arrive from the same key
        assert!(limiter.check("auth:1.2.3.4", 2));
        assert!(limiter.check("auth:1.2.3.4", 2));
        let third = limiter.check("auth:1.2.3.4", 2);

        // THEN: the third is rejected
        assert!(!third);
    }

    #[test]
    fn different_keys_have_independent_windows() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("auth:1.2.3.4", 1));
        assert!(limiter.check("auth:5.6.7.8", 1));
    }

    #[test]
    fn reset_clears_all_windows() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("auth:1.2.3.4", 1));
        assert!(!limiter.check("auth:1.2.3.4", 1));
        limiter.reset();
        assert!(limiter.check("auth:1.2.3.4", 1));
    }

    #[test]
    fn exempt_paths_are_recognized() {
        assert!(is_exempt_path("/_health"));
        assert!(is_exempt_path("/docs"));
        assert!(is_exempt_path("/openapi.json"));
        assert!(!is_exempt_path("/agents"));
    }
}
