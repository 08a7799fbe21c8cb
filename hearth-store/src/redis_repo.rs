use redis::{AsyncCommands, RedisResult};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail fast so the caller can fall back to the file store.
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn get_count(&self, key: &str) -> RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: Option<u64> = conn.get(key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Increment `key`, attaching the window expiry the first time the key
    /// is seen. Done in one Lua script so a crash between INCR and EXPIRE
    /// cannot leave an immortal counter.
    pub async fn incr_window(&self, key: &str, window_seconds: u64) -> RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(
            r#"
            local count = redis.call("INCR", KEYS[1])
            if count == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return count
        "#,
        );

        script
            .key(key)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await
    }

    /// Seconds until `key` expires; `None` when the key is absent or has no
    /// expiry attached.
    pub async fn ttl_seconds(&self, key: &str) -> RedisResult<Option<u64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ttl: i64 = conn.ttl(key).await?;
        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(ttl as u64))
        }
    }
}
