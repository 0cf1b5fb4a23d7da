use std::collections::BTreeMap;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use latex_common::ServiceError;
use latex_sandboxfs::OpenMode;
use latex_session::Session;
use latex_session::TemplateRecord;
use latex_session::validate_conversion_data;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(create_action_descriptor))
        .route("/api/sessions", get(sessions_redirect).post(create_session))
        .route("/api/sessions/{id}", get(get_session).post(update_session))
        .route(
            "/api/sessions/{id}/files",
            get(list_files).post(upload_files),
        )
        .route(
            "/api/sessions/{id}/templates",
            get(list_templates).post(put_template),
        )
        .route("/api/sessions/{id}/product", get(get_product))
        .route("/api/sessions/{id}/log", get(get_log))
        .route("/api/status", get(status))
        .with_state(state)
}

async fn load_or_404(state: &AppState, id: &str) -> Result<Session, ApiError> {
    state
        .manager
        .load_session(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session '{id}' not found")).into())
}

/// Parses a request body as `T`, mapping both malformed JSON and missing
/// required fields to `InvalidRequest` so the facade's documented 400 +
/// `{"error": ...}` contract holds. Bypasses axum's default `Json<T>`
/// extractor, whose rejection is a plain-text 422.
fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ServiceError::InvalidRequest(format!("invalid request body: {err}")).into())
}

fn require_editable(session: &Session) -> Result<(), ApiError> {
    if !session.is_editable() {
        return Err(ServiceError::InvalidState(format!(
            "session '{}' is not editable",
            session.key()
        ))
        .into());
    }
    Ok(())
}

#[derive(Serialize)]
struct ActionDescriptor {
    action: &'static str,
    method: &'static str,
    path: &'static str,
    fields: [&'static str; 3],
}

async fn create_action_descriptor() -> impl IntoResponse {
    Json(ActionDescriptor {
        action: "create-session",
        method: "POST",
        path: "/api/sessions",
        fields: ["compiler", "target", "convert"],
    })
}

async fn sessions_redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/api")])
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    compiler: String,
    target: String,
    convert: Option<Value>,
}

async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: CreateSessionRequest = parse_body(&body)?;
    let session = state
        .manager
        .create_session(&body.compiler, body.target, body.convert.as_ref())
        .await?;
    let public = session.public().await?;
    let location = format!("/api/sessions/{}", session.key());
    info!(session = session.key(), "session created via HTTP facade");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(public)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_or_404(&state, &id).await?;
    Ok(Json(session.public().await?))
}

#[derive(Deserialize)]
struct UpdateSessionRequest {
    finalize: Option<bool>,
    convert: Option<Value>,
}

async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: UpdateSessionRequest = parse_body(&body)?;
    let mut session = load_or_404(&state, &id).await?;
    require_editable(&session)?;

    if let Some(convert_raw) = body.convert.as_ref() {
        let spec = validate_conversion_data(Some(convert_raw))?;
        session.set_convert(spec)?;
        state.manager.save_session(&session).await?;
    }

    let mut status_code = StatusCode::OK;
    if body.finalize.unwrap_or(false) {
        state.manager.finalize_session(&mut session).await?;
        state.task_runner.enqueue(session.key().to_string()).await?;
        info!(session = session.key(), "session finalized and enqueued for rendering");
        status_code = StatusCode::ACCEPTED;
    }

    Ok((status_code, Json(session.public().await?)))
}

async fn list_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_or_404(&state, &id).await?;
    let files = session.files().await?;
    Ok(Json(
        files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
    ))
}

async fn upload_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_or_404(&state, &id).await?;
    require_editable(&session)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServiceError::InvalidRequest(err.to_string()))?
    {
        let destination = field
            .name()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::InvalidRequest("multipart field has no name".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ServiceError::InvalidRequest(err.to_string()))?;
        let mut handle = session.source_files().open(&destination, OpenMode::Write).await?;
        handle.write_all(&bytes).await?;
        handle.flush().await?;
    }

    let files = session.files().await?;
    Ok((
        StatusCode::CREATED,
        Json(files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()),
    ))
}

async fn list_templates(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_or_404(&state, &id).await?;
    Ok(Json(session.templates().await?))
}

async fn put_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let template: TemplateRecord = parse_body(&body)?;
    let session = load_or_404(&state, &id).await?;
    require_editable(&session)?;
    session.put_template(&template).await?;
    Ok((StatusCode::CREATED, Json(session.templates().await?)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_or_404(&state, &id).await?;
    let product = session
        .product()
        .ok_or_else(|| ServiceError::NotFound(format!("session '{id}' has no product")))?;
    let bytes = tokio::fs::read(product).await.map_err(ServiceError::from)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_or_404(&state, &id).await?;
    let log = session
        .log()
        .ok_or_else(|| ServiceError::NotFound(format!("session '{id}' has no log")))?;
    let contents = tokio::fs::read_to_string(log).await.map_err(ServiceError::from)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], contents))
}

#[derive(Serialize)]
struct StatusResponse {
    time: f64,
    sessions: BTreeMap<&'static str, u64>,
}

async fn status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let time = state.manager.clock().now();
    let mut sessions = BTreeMap::new();
    for key in state.manager.get_all_session_ids().await? {
        if let Some(session) = state.manager.load_session(&key).await? {
            *sessions.entry(session.status().label()).or_insert(0) += 1;
        }
    }
    Ok(Json(StatusResponse { time, sessions }))
}
