use async_trait::async_trait;
use std::time::Duration;

/// Atomic counter store backing the fixed-window rate limiter.
///
/// The primary implementation rides on Redis (`INCR` + `EXPIRE`); a
/// file-based fallback covers deployments where Redis is unreachable. Both
/// must produce the same accept/reject decisions for the same window and
/// limit. The store is always injected, never reached through process-wide
/// state, so tests can substitute an in-memory fake.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count for `key`, zero if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Increment `key`, creating it with `window` expiry on first increment.
    /// Returns the post-increment count.
    async fn incr(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Remaining time until the key's window resets. `None` when the key is
    /// absent (the next request would start a fresh window).
    async fn ttl(
        &self,
        key: &str,
    ) -> Result<Option<Duration>, Box<dyn std::error::Error + Send + Sync>>;
}
