//! Ephemeral Store (C3): deduplication keys, debounce buffers, rate-limit
//! counters, and an embedding cache, all backed by Redis with TTLs. Modeled
//! as capability interfaces (`DedupStore`, `DebounceBuffer`, `RateLimiter`,
//! `EmbeddingCache`) rather than a process-wide singleton (SPEC_FULL §9).

mod redis_store;

pub use redis_store::RedisEphemeralStore;

use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Atomic set-if-absent. Returns `true` if this call newly marked the
    /// message seen, `false` if it was already present (a duplicate).
    async fn mark_seen(&self, workspace_id: Uuid, provider_message_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait DebounceBuffer: Send + Sync {
    /// Appends a message to the per-`(workspace, contact)` buffer, returning
    /// the buffer contents so far (oldest first) and whether the caller
    /// should flush immediately (buffer reached the configured cap).
    async fn push(
        &self,
        workspace_id: Uuid,
        contact: &str,
        message: BufferedMessage,
        max_buffer: usize,
        ttl_seconds: u64,
    ) -> Result<Vec<BufferedMessage>>;

    /// Atomically drains and clears the buffer, returning what was in it.
    async fn drain(&self, workspace_id: Uuid, contact: &str) -> Result<Vec<BufferedMessage>>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BufferedMessage {
    pub timestamp_ms: i64,
    pub text: String,
    pub provider_message_id: String,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Increments the counter for `key` within the current minute bucket and
    /// returns the post-increment count.
    async fn incr_minute_bucket(&self, key: &str) -> Result<u64>;
}

#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    async fn get(&self, workspace_id: Uuid, query_hash: &str) -> Result<Option<Vec<f32>>>;
    async fn set(&self, workspace_id: Uuid, query_hash: &str, vector: &[f32], ttl_seconds: u64) -> Result<()>;
}
