use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use latex_common::Result;
use tokio::sync::Mutex;

use crate::MetaStore;

/// In-memory `MetaStore`, suitable for tests and single-process deployments
/// that don't need cross-instance sharing. Not persisted across restarts.
#[derive(Default)]
pub struct InMemoryMetaStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetaStore for InMemoryMetaStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.sets
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        if let Some(set) = self.sets.lock().await.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<String>> {
        Ok(self.sets.lock().await.get(key).cloned().unwrap_or_default())
    }

    async fn spop(&self, key: &str) -> Result<Option<String>> {
        let mut sets = self.sets.lock().await;
        let Some(set) = sets.get_mut(key) else {
            return Ok(None);
        };
        let member = set.iter().next().cloned();
        if let Some(member) = &member {
            set.remove(member);
        }
        Ok(member)
    }
}
