//! Photo routes: multipart upload, approval, per-task listing.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::publish;
use crate::locale::Message;
use crate::model::{Photo, UserRole};
use crate::services::error::ValidationError;
use crate::services::photo::{self, PhotoMeta, PhotoUpload};
use crate::services::realtime::{ChangeOp, Table};
use crate::state::AppState;

/// Form field carrying the image bytes.
const FILE_FIELD: &str = "file";

fn multipart_error(err: &MultipartError) -> ApiError {
    let status = err.status();
    tracing::debug!(error = %err, %status, "multipart read failed");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(status, "E_VALIDATION", Message::UploadRejected)
    } else {
        ApiError::bad_request(Message::UploadRejected)
    }
}

/// Drain the form: one `file` part plus text metadata fields.
async fn read_upload(mut multipart: Multipart) -> Result<PhotoUpload, ApiError> {
    let mut meta = PhotoMeta::default();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == FILE_FIELD {
            let content_type = field.content_type().unwrap_or_default().to_owned();
            let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
            file = Some((content_type, bytes.to_vec()));
        } else {
            let value = field.text().await.map_err(|e| multipart_error(&e))?;
            meta.set_field(&name, &value)?;
        }
    }

    let (content_type, bytes) = file.ok_or(ValidationError::PhotoRequired)?;
    Ok(meta.into_upload(content_type, bytes)?)
}

/// `POST /api/photos` (multipart)
pub async fn upload(State(state): State<AppState>, caller: Caller, multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    caller.require_any(&[UserRole::Worker, UserRole::Admin])?;
    let upload = read_upload(multipart).await?;
    let stored = photo::upload_photo(
        &state.pool,
        state.storage.as_ref(),
        &caller.profile,
        &upload,
        state.config.max_upload_bytes,
    )
    .await?;
    publish(&state, Table::Photos, ChangeOp::Insert, stored.id, &stored);
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `POST /api/photos/{id}/approve`
pub async fn approve(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<Json<Photo>, ApiError> {
    caller.require(UserRole::Admin)?;
    let approved = photo::approve_photo(&state.pool, id).await?;
    publish(&state, Table::Photos, ChangeOp::Update, id, &approved);
    Ok(Json(approved))
}

/// `GET /api/tasks/{id}/photos`
pub async fn task_photos(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Vec<Photo>>, ApiError> {
    Ok(Json(photo::task_photos_for(&state.pool, &caller.profile, task_id).await?))
}

/// `GET /api/projects/{id}/photos`
pub async fn project_photos(
    State(state): State<AppState>,
    caller: Caller,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Photo>>, ApiError> {
    Ok(Json(photo::project_photos_for(&state.pool, &caller.profile, project_id).await?))
}
