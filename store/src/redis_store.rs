use std::collections::HashSet;

use async_trait::async_trait;
use latex_common::Result;
use latex_common::ServiceError;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;
use tracing::warn;

use crate::MetaStore;

fn fatal(context: &str, err: redis::RedisError) -> ServiceError {
    warn!(context, %err, "redis command failed");
    ServiceError::Fatal(format!("redis error during {context}: {err}"))
}

/// Redis-backed `MetaStore`. Uses a `ConnectionManager`, which reconnects
/// transparently, so a single instance can be shared across tasks for the
/// lifetime of the process.
#[derive(Clone)]
pub struct RedisMetaStore {
    conn: ConnectionManager,
}

impl RedisMetaStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| fatal("client setup", e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| fatal("connection", e))?;
        info!("connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl MetaStore for RedisMetaStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| fatal("GET", e))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.map_err(|e| fatal("SET", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| fatal("DEL", e))?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(key, member).await.map_err(|e| fatal("SADD", e))?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(key, member).await.map_err(|e| fatal("SREM", e))?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(|e| fatal("SMEMBERS", e))
    }

    async fn spop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.spop(key).await.map_err(|e| fatal("SPOP", e))
    }
}
