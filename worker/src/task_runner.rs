use std::sync::Arc;

use latex_common::Result;
use latex_common::ServiceError;
use latex_session::SessionManager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

/// FIFO background executor for Renderer invocations, kept off the HTTP
/// request path (§4.7). A bounded channel backs the queue; `enqueue`
/// returns as soon as the job is queued, not when it completes.
pub struct TaskRunner {
    sender: mpsc::Sender<String>,
}

impl TaskRunner {
    /// Spawns the worker task and returns a handle to it alongside the
    /// `TaskRunner` used to submit jobs. The worker runs until every
    /// `TaskRunner` clone referencing `sender` is dropped.
    pub fn spawn(manager: Arc<SessionManager>, queue_capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<String>(queue_capacity);

        let handle = tokio::spawn(async move {
            while let Some(session_key) = receiver.recv().await {
                info!(session = %session_key, "dequeued render job");
                match latex_render::render_session(&manager, &session_key).await {
                    Ok(()) => {}
                    Err(err) => {
                        // A crashed/fatal job leaves the session in
                        // `finalized`; the Sweeper reclaims it on expiry.
                        error!(session = %session_key, %err, "render job abandoned");
                    }
                }
            }
        });

        (Self { sender }, handle)
    }

    pub async fn enqueue(&self, session_key: impl Into<String>) -> Result<()> {
        self.sender
            .send(session_key.into())
            .await
            .map_err(|_| ServiceError::Fatal("task runner queue is no longer accepting jobs".into()))
    }
}
