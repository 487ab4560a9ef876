use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::{AppState, SharedSession};
use crate::application::{ChatSession, SessionStatus};
use crate::domain::{ChatTurn, DomainError};

pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub session: SessionStatus,
}

fn busy() -> DomainError {
    DomainError::conflict("The session is busy answering a question.")
}

fn claim(session: &SharedSession) -> Result<tokio::sync::MutexGuard<'_, ChatSession>, ApiError> {
    session.try_lock().map_err(|_| ApiError(busy()))
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionStatus>), ApiError> {
    let (_, session) = state.sessions.create(state.pipeline.clone())?;
    let status = session.lock().await.status();
    Ok((StatusCode::CREATED, Json(status)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, ApiError> {
    let session = state.sessions.get(id)?;
    let status = session.lock().await.status();
    Ok(Json(status))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<SessionStatus>, ApiError> {
    let shared = state.sessions.get(id)?;
    let mut session = claim(&shared)?;
    session.set_credential(request.api_key);
    Ok(Json(session.status()))
}

pub async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let shared = state.sessions.get(id)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DomainError::validation(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| DomainError::validation("The upload has no file name."))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DomainError::validation(format!("Invalid upload: {e}")))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }
    let (filename, bytes) = upload.ok_or_else(|| {
        DomainError::validation(format!("Multipart field '{UPLOAD_FIELD}' is required."))
    })?;

    // The load runs to completion even if the client goes away.
    let mut session = shared.try_lock_owned().map_err(|_| ApiError(busy()))?;
    let response = tokio::spawn(async move {
        let message = session.upload(&filename, bytes).await?;
        Ok::<_, DomainError>(UploadResponse {
            message,
            session: session.status(),
        })
    })
    .await
    .map_err(|e| DomainError::internal(format!("upload task failed: {e}")))??;
    Ok(Json(response))
}

pub async fn remove_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, ApiError> {
    let shared = state.sessions.get(id)?;
    let mut session = claim(&shared)?;
    session.reset();
    Ok(Json(session.status()))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatTurn>>, ApiError> {
    let session = state.sessions.get(id)?;
    let history = session.lock().await.history().to_vec();
    Ok(Json(history))
}
