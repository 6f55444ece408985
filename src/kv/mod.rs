mod memory;

pub use memory::MemoryKv;

use async_trait::async_trait;

use crate::error::CoreError;

/// Narrow interface the core consumes for its key-value and sorted-set
/// needs (§6). A real deployment backs this with something Redis-shaped;
/// the core only ever talks to this trait.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CoreError>;
    async fn zadd(&self, key: &str, score_ms: i64, member: &str) -> Result<(), CoreError>;
    async fn zrange_all(&self, key: &str) -> Result<Vec<String>, CoreError>;
    async fn zrange_by_score_count(&self, key: &str, min: i64, max: i64) -> Result<u64, CoreError>;
    async fn zrem_by_score(&self, key: &str, min: i64, max: i64) -> Result<(), CoreError>;
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CoreError>;
}
