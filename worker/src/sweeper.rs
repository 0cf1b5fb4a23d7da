use std::sync::Arc;
use std::time::Duration;

use latex_common::Result;
use latex_session::SessionManager;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reaped: Vec<String>,
    pub healed: Vec<String>,
}

/// Periodic reclamation job (§4.8). Each tick enumerates the instance's
/// live session keys, deletes any whose TTL has elapsed, and heals
/// membership entries whose record is already gone.
pub struct Sweeper;

impl Sweeper {
    pub async fn sweep_once(manager: &SessionManager) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for key in manager.get_all_session_ids().await? {
            match manager.load_session(&key).await? {
                Some(session) => {
                    if manager.clock().now() >= session.record().expires_at {
                        info!(session = %key, "sweeping expired session");
                        manager.delete_session(&key).await?;
                        report.reaped.push(key);
                    }
                }
                None => {
                    warn!(session = %key, "healing dangling instance-set membership");
                    manager.forget_session_id(&key).await?;
                    report.healed.push(key);
                }
            }
        }
        Ok(report)
    }

    /// Spawns the periodic tick loop. Runs until aborted.
    pub fn spawn(manager: Arc<SessionManager>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = Self::sweep_once(&manager).await {
                    error!(%err, "sweep tick failed");
                }
            }
        })
    }
}
