use super::{BufferedMessage, DebounceBuffer, DedupStore, EmbeddingCache, RateLimiter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

/// The one concrete implementation of the ephemeral-store capability
/// interfaces, backed by a shared Redis connection manager.
#[derive(Clone)]
pub struct RedisEphemeralStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisEphemeralStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::Redis)?;
        let conn = client.get_connection_manager().await.map_err(Error::Redis)?;
        Ok(Self { conn })
    }

    fn dedup_key(workspace_id: Uuid, provider_message_id: &str) -> String {
        format!("dedup:{workspace_id}:{provider_message_id}")
    }

    fn debounce_key(workspace_id: Uuid, contact: &str) -> String {
        format!("debounce:{workspace_id}:{contact}")
    }

    fn ratelimit_key(key: &str) -> String {
        let minute_bucket = chrono::Utc::now().timestamp() / 60;
        format!("ratelimit:{key}:{minute_bucket}")
    }

    fn embcache_key(workspace_id: Uuid, query_hash: &str) -> String {
        format!("embcache:{workspace_id}:{query_hash}")
    }
}

#[async_trait]
impl DedupStore for RedisEphemeralStore {
    async fn mark_seen(&self, workspace_id: Uuid, provider_message_id: &str) -> Result<bool> {
        let key = Self::dedup_key(workspace_id, provider_message_id);
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(3600)
            .query_async(&mut conn)
            .await
            .map_err(Error::Redis)?;
        Ok(set.is_some())
    }
}

#[async_trait]
impl DebounceBuffer for RedisEphemeralStore {
    async fn push(
        &self,
        workspace_id: Uuid,
        contact: &str,
        message: BufferedMessage,
        max_buffer: usize,
        ttl_seconds: u64,
    ) -> Result<Vec<BufferedMessage>> {
        let key = Self::debounce_key(workspace_id, contact);
        let mut conn = self.conn.clone();

        let existing: Option<String> = conn.get(&key).await.map_err(Error::Redis)?;
        let mut buffer: Vec<BufferedMessage> = existing
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        buffer.push(message);
        if buffer.len() > max_buffer {
            buffer.remove(0);
        }

        let serialized = serde_json::to_string(&buffer)?;
        let _: () = conn
            .set_ex(&key, serialized, ttl_seconds)
            .await
            .map_err(Error::Redis)?;

        Ok(buffer)
    }

    async fn drain(&self, workspace_id: Uuid, contact: &str) -> Result<Vec<BufferedMessage>> {
        let key = Self::debounce_key(workspace_id, contact);
        let mut conn = self.conn.clone();

        // GETDEL makes the read-and-clear atomic.
        let existing: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(Error::Redis)?;

        Ok(existing
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RateLimiter for RedisEphemeralStore {
    async fn incr_minute_bucket(&self, key: &str) -> Result<u64> {
        let bucket_key = Self::ratelimit_key(key);
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(&bucket_key, 1u64).await.map_err(Error::Redis)?;
        if count == 1 {
            let _: () = conn.expire(&bucket_key, 70).await.map_err(Error::Redis)?;
        }
        Ok(count)
    }
}

#[async_trait]
impl EmbeddingCache for RedisEphemeralStore {
    async fn get(&self, workspace_id: Uuid, query_hash: &str) -> Result<Option<Vec<f32>>> {
        let key = Self::embcache_key(workspace_id, query_hash);
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(&key).await.map_err(Error::Redis)?;
        Ok(raw.map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        }))
    }

    async fn set(&self, workspace_id: Uuid, query_hash: &str, vector: &[f32], ttl_seconds: u64) -> Result<()> {
        let key = Self::embcache_key(workspace_id, query_hash);
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(&key, bytes, ttl_seconds).await.map_err(Error::Redis)?;
        Ok(())
    }
}
