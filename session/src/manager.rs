use std::collections::HashSet;
use std::sync::Arc;

use latex_clock::Clock;
use latex_common::Result;
use latex_common::ServiceError;
use latex_sandboxfs::SandboxFs;
use latex_store::MetaStore;
use rand::RngCore;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use crate::record::Compiler;
use crate::record::SessionRecord;
use crate::record::Status;
use crate::record::validate_conversion_data;
use crate::session::Session;

const KEY_BYTES: usize = 8;
const MAX_KEY_COLLISION_RETRIES: usize = 8;

fn record_key(session_key: &str) -> String {
    format!("session:{session_key}")
}

/// Generates the 16 hex character session key. Uniqueness is not guaranteed
/// by construction; `SessionManager::create_session` retries on collision.
fn make_id() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Owns the working directory root and the per-instance MetaStore index,
/// and is the only path through which sessions are created, loaded, saved,
/// or deleted.
pub struct SessionManager {
    root: SandboxFs,
    store: Arc<dyn MetaStore>,
    clock: Arc<dyn Clock>,
    instance_key: String,
    session_ttl_sec: u64,
}

impl SessionManager {
    pub fn new(
        root: SandboxFs,
        store: Arc<dyn MetaStore>,
        clock: Arc<dyn Clock>,
        instance_key: impl Into<String>,
        session_ttl_sec: u64,
    ) -> Self {
        Self {
            root,
            store,
            clock,
            instance_key: instance_key.into(),
            session_ttl_sec,
        }
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    async fn unique_key(&self) -> Result<String> {
        for _ in 0..MAX_KEY_COLLISION_RETRIES {
            let candidate = make_id();
            if self.store.get(&record_key(&candidate)).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(ServiceError::Fatal(
            "failed to allocate a unique session key".into(),
        ))
    }

    pub async fn create_session(
        &self,
        compiler: &str,
        target: String,
        convert: Option<&Value>,
    ) -> Result<Session> {
        let compiler = Compiler::parse(compiler)?;
        let convert = validate_conversion_data(convert)?;
        let key = self.unique_key().await?;

        self.root.makedirs(&key).await?;

        let now = self.clock.now();
        let record = SessionRecord {
            key: key.clone(),
            compiler,
            target,
            created: now,
            expires_at: now + self.session_ttl_sec as f64,
            status: Status::Editable,
            convert,
            product: None,
            log: None,
        };

        let session_root = self.root.create_from(&key)?;
        let session = Session::new(record, session_root).await?;

        self.store.sadd(&self.instance_key, &key).await?;
        self.save_session(&session).await?;

        info!(session = key, compiler = ?session.compiler(), "session created");
        Ok(session)
    }

    pub async fn load_session(&self, key: &str) -> Result<Option<Session>> {
        let Some(bytes) = self.store.get(&record_key(key)).await? else {
            return Ok(None);
        };
        let record: SessionRecord = serde_json::from_slice(&bytes)?;
        let session_root = self.root.create_from(&record.key)?;
        let session = Session::new(record, session_root).await?;
        Ok(Some(session))
    }

    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let bytes = serde_json::to_vec(session.record())?;
        self.store.set(&record_key(session.key()), bytes).await
    }

    /// Removes the working tree, the metadata record, and the instance-set
    /// membership. Idempotent: missing pieces are treated as already gone.
    pub async fn delete_session(&self, key: &str) -> Result<()> {
        self.root.rmtree(key).await?;
        self.store.delete(&record_key(key)).await?;
        self.store.srem(&self.instance_key, key).await?;
        info!(session = key, "session deleted");
        Ok(())
    }

    pub async fn get_all_session_ids(&self) -> Result<HashSet<String>> {
        self.store.smembers(&self.instance_key).await
    }

    /// Removes `key` from the instance-set without touching a metadata
    /// record or working tree, for healing a dangling membership entry
    /// whose record is already gone (§7).
    pub async fn forget_session_id(&self, key: &str) -> Result<()> {
        debug!(session = key, "healing dangling instance-set membership");
        self.store.srem(&self.instance_key, key).await
    }

    pub async fn finalize_session(&self, session: &mut Session) -> Result<()> {
        session.finalize()?;
        self.save_session(session).await?;
        info!(session = session.key(), "session finalized");
        Ok(())
    }

    pub async fn complete_session(
        &self,
        session: &mut Session,
        product: String,
        log: String,
    ) -> Result<()> {
        session.set_complete(product, log)?;
        self.save_session(session).await?;
        info!(session = session.key(), "session compiled successfully");
        Ok(())
    }

    pub async fn error_session(&self, session: &mut Session, log: String) -> Result<()> {
        session.set_errored(log)?;
        self.save_session(session).await?;
        info!(session = session.key(), "session ended in error");
        Ok(())
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
