use std::sync::Arc;

use latex_session::SessionManager;
use latex_worker::TaskRunner;

/// Shared application state handed to every handler: the single
/// `SessionManager` for this instance and the `TaskRunner` queue its POST
/// handlers enqueue onto.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub task_runner: Arc<TaskRunner>,
}
