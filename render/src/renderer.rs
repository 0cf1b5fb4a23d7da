use latex_common::Result;
use latex_common::ServiceError;
use latex_session::Session;
use latex_session::SessionManager;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing::warn;

use crate::compile::compile_to_fixed_point;
use crate::compile::rasterize;
use crate::template::expand_templates;

/// The Renderer: expands templates, drives the compiler to a fixed point,
/// optionally rasterizes, and commits the result onto the session (§4.6).
///
/// Never returns an `Err` for a compilation failure — those are represented
/// by `status = error` on the session. An `Err` here means a configuration
/// problem severe enough to abandon the job (unknown session, missing
/// working directory).
pub async fn render_session(manager: &SessionManager, session_key: &str) -> Result<()> {
    let Some(mut session) = manager.load_session(session_key).await? else {
        return Err(ServiceError::Fatal(format!(
            "render invoked for unknown session '{session_key}'"
        )));
    };

    if session.status() != latex_session::Status::Finalized {
        info!(
            session = session_key,
            status = ?session.status(),
            "render invoked on a session that is no longer finalized, skipping"
        );
        return Ok(());
    }

    match compile(&mut session).await {
        Ok((product, log)) => {
            manager.complete_session(&mut session, product, log).await?;
        }
        Err(CompileError::Failed { log }) => {
            manager.error_session(&mut session, log).await?;
        }
        Err(CompileError::Fatal(err)) => return Err(err),
    }

    Ok(())
}

enum CompileError {
    /// Compilation ran but did not succeed; recorded as `status = error`.
    Failed { log: String },
    /// A configuration problem severe enough to abandon the job.
    Fatal(ServiceError),
}

async fn compile(session: &mut Session) -> std::result::Result<(String, String), CompileError> {
    expand_templates(session).await.map_err(CompileError::Fatal)?;

    let outcome = compile_to_fixed_point(
        session.source_files(),
        session.key(),
        session.compiler(),
        session.target(),
    )
    .await
    .map_err(CompileError::Fatal)?;

    if !outcome.success {
        return Err(CompileError::Failed {
            log: outcome.log_path,
        });
    }

    let mut product_path = outcome
        .product_path
        .clone()
        .unwrap_or_else(|| outcome.log_path.clone());

    if let Some(convert) = session.convert() {
        match rasterize(session.source_files(), &product_path, convert).await {
            Ok(relative) => {
                product_path = session.source_files().root_path().join(relative).display().to_string();
            }
            Err(err) => {
                warn!(session = session.key(), %err, "rasterization failed");
                annotate_log(&outcome.log_path, &err).await;
                return Err(CompileError::Failed {
                    log: outcome.log_path,
                });
            }
        }
    }

    Ok((product_path, outcome.log_path))
}

/// Appends a conversion-failure note to the compile log so that a client
/// polling `GET .../log` after a failed rasterization sees why the session
/// ended in `error` even though compilation itself succeeded. Best effort:
/// the job is already failing, so a write error here is only logged, not
/// propagated.
async fn annotate_log(log_path: &str, err: &ServiceError) {
    let note = format!("\n--- rasterization failed: {err} ---\n");
    match tokio::fs::OpenOptions::new().append(true).open(log_path).await {
        Ok(mut file) => {
            if let Err(write_err) = file.write_all(note.as_bytes()).await {
                warn!(log_path, %write_err, "failed to annotate log with rasterization failure");
            }
        }
        Err(open_err) => {
            warn!(log_path, %open_err, "failed to open log to annotate rasterization failure");
        }
    }
}
