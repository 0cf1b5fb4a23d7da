//! Abstract key/value + set store used to persist session metadata and the
//! per-instance session index (§4.3). Two implementations are provided: an
//! in-memory store for tests and single-process deployments, and a Redis
//! store (the `REDIS_URL` configuration key assumes this is the production
//! choice) backed by `redis::aio::ConnectionManager`.

pub mod memory;
pub mod redis_store;

use std::collections::HashSet;

use async_trait::async_trait;
use latex_common::Result;

pub use memory::InMemoryMetaStore;
pub use redis_store::RedisMetaStore;

/// No transactional guarantees are required across keys or across the
/// individual primitives below; callers must tolerate non-atomic pairs
/// (e.g. a set member whose record was separately deleted).
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;

    async fn sadd(&self, key: &str, member: &str) -> Result<()>;
    async fn srem(&self, key: &str, member: &str) -> Result<()>;
    async fn smembers(&self, key: &str) -> Result<HashSet<String>>;
    async fn spop(&self, key: &str) -> Result<Option<String>>;
}
