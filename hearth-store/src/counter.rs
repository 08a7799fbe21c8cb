use async_trait::async_trait;
use hearth_core::counter::CounterStore;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::redis_repo::RedisClient;

/// Primary counter store: Redis `INCR` with attached `EXPIRE`.
pub struct RedisCounterStore {
    redis: RedisClient,
}

impl RedisCounterStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.redis.get_count(key).await?)
    }

    async fn incr(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.redis.incr_window(key, window.as_secs()).await?)
    }

    async fn ttl(
        &self,
        key: &str,
    ) -> Result<Option<Duration>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .redis
            .ttl_seconds(key)
            .await?
            .map(Duration::from_secs))
    }
}

/// Degraded-availability fallback used when Redis is unreachable at
/// startup: one file per key holding the unix timestamps of requests in
/// the current window, pruned on every write.
///
/// Decisions match the Redis store for the same window and limit. The
/// read-prune-write cycle is NOT safe under concurrent writers; this is a
/// known limitation of the degraded path, acceptable because the fallback
/// serves a single process that has already lost its shared store.
pub struct FileCounterStore {
    dir: PathBuf,
    window: Duration,
}

impl FileCounterStore {
    pub fn new(dir: impl Into<PathBuf>, window: Duration) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, window })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are `ratelimit:{ip}:{endpoint}`; squash anything that is not
        // filename-safe.
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn read_timestamps(&self, key: &str) -> Vec<u64> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn live_timestamps(&self, key: &str, now: u64) -> Vec<u64> {
        let window = self.window.as_secs();
        self.read_timestamps(key)
            .into_iter()
            .filter(|t| now.saturating_sub(*t) < window)
            .collect()
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn get(&self, key: &str) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.live_timestamps(key, Self::now_secs()).len() as u64)
    }

    async fn incr(
        &self,
        key: &str,
        _window: Duration,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let now = Self::now_secs();
        let mut stamps = self.live_timestamps(key, now);
        stamps.push(now);
        std::fs::write(self.path_for(key), serde_json::to_vec(&stamps)?)?;
        Ok(stamps.len() as u64)
    }

    async fn ttl(
        &self,
        key: &str,
    ) -> Result<Option<Duration>, Box<dyn std::error::Error + Send + Sync>> {
        let now = Self::now_secs();
        let stamps = self.live_timestamps(key, now);
        let Some(oldest) = stamps.iter().min() else {
            return Ok(None);
        };
        let elapsed = now.saturating_sub(*oldest);
        let remaining = self.window.as_secs().saturating_sub(elapsed);
        Ok(Some(Duration::from_secs(remaining)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(window_secs: u64) -> FileCounterStore {
        let dir = tempfile::tempdir().unwrap();
        // Leak the tempdir so it outlives the store for the test's duration.
        let path = dir.keep();
        FileCounterStore::new(path, Duration::from_secs(window_secs)).unwrap()
    }

    #[tokio::test]
    async fn test_counts_within_window() {
        let store = store(60);
        assert_eq!(store.get("ratelimit:1.2.3.4:properties").await.unwrap(), 0);
        for expected in 1..=3u64 {
            let count = store
                .incr("ratelimit:1.2.3.4:properties", Duration::from_secs(60))
                .await
                .unwrap();
            assert_eq!(count, expected);
        }
        assert_eq!(store.get("ratelimit:1.2.3.4:properties").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = store(60);
        store.incr("ratelimit:1.2.3.4:a", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("ratelimit:1.2.3.4:b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ttl_bounds() {
        let store = store(60);
        assert!(store.ttl("ratelimit:absent:x").await.unwrap().is_none());

        store.incr("ratelimit:1.2.3.4:a", Duration::from_secs(60)).await.unwrap();
        let ttl = store.ttl("ratelimit:1.2.3.4:a").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_window_elapse_resets() {
        // A zero-length window makes every recorded timestamp immediately
        // stale, simulating the clock advancing past the window.
        let store = store(0);
        store.incr("ratelimit:1.2.3.4:a", Duration::from_secs(0)).await.unwrap();
        assert_eq!(store.get("ratelimit:1.2.3.4:a").await.unwrap(), 0);
    }
}
