//! Entry point for the `latex-service` binary: wires configuration, the
//! HTTP facade, the background TaskRunner, and the Sweeper together and
//! serves them on a multi-threaded Tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use latex_api::AppState;
use latex_clock::Clock;
use latex_clock::RealClock;
use latex_common::ServiceConfig;
use latex_sandboxfs::SandboxFs;
use latex_session::SessionManager;
use latex_store::MetaStore;
use latex_store::RedisMetaStore;
use latex_worker::Sweeper;
use latex_worker::TaskRunner;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?,
        )
        .with_writer(std::io::stderr)
        .try_init();

    let config = ServiceConfig::from_env();
    info!(?config, "starting latex-service");

    std::fs::create_dir_all(&config.working_directory)?;
    let root = SandboxFs::new(&config.working_directory)?;

    let store: Arc<dyn MetaStore> = Arc::new(RedisMetaStore::connect(&config.redis_url).await?);
    let clock: Arc<dyn Clock> = Arc::new(RealClock);

    let manager = Arc::new(SessionManager::new(
        root,
        store,
        clock,
        config.instance_key.clone(),
        config.session_ttl_sec,
    ));

    let (task_runner, task_runner_handle) =
        TaskRunner::spawn(manager.clone(), config.task_queue_capacity);
    let sweeper_handle = Sweeper::spawn(
        manager.clone(),
        Duration::from_secs(config.clear_expired_interval_sec),
    );

    let state = AppState {
        manager,
        task_runner: Arc::new(task_runner),
    };
    let app = latex_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    task_runner_handle.abort();
    sweeper_handle.abort();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
