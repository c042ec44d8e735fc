//! Photo upload pipeline and photo queries.
//!
//! Upload order: validate type and size, check the uploader may post to the
//! project (and task), store the bytes, insert the row. If the insert fails
//! the stored object is removed again.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use super::error::{ServiceError, ValidationError, optional_text};
use super::storage::{PhotoStorage, extension_for, photo_key};
use crate::model::{Photo, PhotoType, Profile, UserRole};

/// Metadata fields of a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct PhotoMeta {
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub photo_type: Option<PhotoType>,
    pub description: Option<String>,
}

impl PhotoMeta {
    /// Apply one text field of the form. Unknown fields are ignored; blank
    /// values leave the field unset.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        match name {
            "project_id" => {
                self.project_id = Some(Uuid::parse_str(value).map_err(|_| ValidationError::UnknownReference("project_id"))?);
            }
            "task_id" => {
                self.task_id = Some(Uuid::parse_str(value).map_err(|_| ValidationError::UnknownReference("task_id"))?);
            }
            "photo_type" => {
                self.photo_type =
                    Some(PhotoType::parse(value).ok_or_else(|| ValidationError::Upload(format!("unknown photo_type {value}")))?);
            }
            "description" => self.description = Some(value.to_owned()),
            _ => {}
        }
        Ok(())
    }

    pub fn into_upload(self, content_type: String, bytes: Vec<u8>) -> Result<PhotoUpload, ValidationError> {
        Ok(PhotoUpload {
            project_id: self.project_id.ok_or(ValidationError::Required("project_id"))?,
            task_id: self.task_id,
            photo_type: self.photo_type.unwrap_or_default(),
            description: self.description,
            content_type,
            bytes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub photo_type: PhotoType,
    pub description: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Check content type and size. Returns the file extension to store under.
pub fn validate_upload(content_type: &str, len: usize, max_bytes: usize) -> Result<&'static str, ValidationError> {
    if len == 0 {
        return Err(ValidationError::Upload("empty file".into()));
    }
    if len > max_bytes {
        return Err(ValidationError::Upload(format!("file exceeds {max_bytes} bytes")));
    }
    extension_for(content_type).ok_or_else(|| ValidationError::Upload(format!("unsupported content type {content_type}")))
}

// =============================================================================
// ACCESS
// =============================================================================

/// Admins may post to any project; workers only to projects where they have a
/// task, and to a specific task only when it is theirs.
async fn check_upload_access(pool: &PgPool, uploader: &Profile, upload: &PhotoUpload) -> Result<(), ServiceError> {
    if let Some(task_id) = upload.task_id {
        let row: Option<(Uuid, Option<Uuid>)> = sqlx::query_as("SELECT project_id, assigned_to FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(pool)
            .await?;
        let (project_id, assigned_to) = row.ok_or_else(|| ServiceError::not_found("task", task_id))?;
        if project_id != upload.project_id {
            return Err(ValidationError::UnknownReference("task_id").into());
        }
        return match uploader.role {
            UserRole::Admin => Ok(()),
            UserRole::Worker if assigned_to == Some(uploader.id) => Ok(()),
            _ => Err(ServiceError::Forbidden("task is not assigned to this worker")),
        };
    }

    match uploader.role {
        UserRole::Admin => {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
                .bind(upload.project_id)
                .fetch_one(pool)
                .await?;
            if exists { Ok(()) } else { Err(ServiceError::not_found("project", upload.project_id)) }
        }
        UserRole::Worker => {
            if worker_has_task_on(pool, uploader.id, upload.project_id).await? {
                Ok(())
            } else {
                Err(ServiceError::Forbidden("worker has no task on this project"))
            }
        }
        UserRole::Client => Err(ServiceError::Forbidden("clients cannot upload photos")),
    }
}

pub(crate) async fn worker_has_task_on(pool: &PgPool, worker_id: Uuid, project_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tasks WHERE project_id = $1 AND assigned_to = $2)")
        .bind(project_id)
        .bind(worker_id)
        .fetch_one(pool)
        .await
}

// =============================================================================
// UPLOAD
// =============================================================================

pub async fn upload_photo(
    pool: &PgPool,
    storage: &dyn PhotoStorage,
    uploader: &Profile,
    upload: &PhotoUpload,
    max_bytes: usize,
) -> Result<Photo, ServiceError> {
    let extension = validate_upload(&upload.content_type, upload.bytes.len(), max_bytes)?;
    check_upload_access(pool, uploader, upload).await?;

    let key = photo_key(uploader.id, extension);
    let url = storage.put(&key, &upload.bytes).await?;

    let inserted = sqlx::query_as::<_, Photo>(
        r"INSERT INTO photos (project_id, task_id, uploaded_by, photo_url, description, photo_type)
          VALUES ($1, $2, $3, $4, $5, $6)
          RETURNING *",
    )
    .bind(upload.project_id)
    .bind(upload.task_id)
    .bind(uploader.id)
    .bind(&url)
    .bind(optional_text(upload.description.as_deref()))
    .bind(upload.photo_type.as_str())
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(photo) => {
            tracing::info!(photo_id = %photo.id, project_id = %photo.project_id, "photo uploaded");
            Ok(photo)
        }
        Err(e) => {
            if let Err(cleanup) = storage.delete(&key).await {
                tracing::warn!(error = %cleanup, key, "orphaned photo object");
            }
            Err(e.into())
        }
    }
}

pub async fn approve_photo(pool: &PgPool, id: Uuid) -> Result<Photo, ServiceError> {
    sqlx::query_as::<_, Photo>("UPDATE photos SET is_approved = true WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("photo", id))
}

// =============================================================================
// QUERIES
// =============================================================================

/// Photos of the given tasks, newest first, grouped by task.
pub async fn photos_by_task(pool: &PgPool, task_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Photo>>, sqlx::Error> {
    if task_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let photos = sqlx::query_as::<_, Photo>(
        "SELECT * FROM photos WHERE task_id = ANY($1) ORDER BY created_at DESC",
    )
    .bind(task_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<Photo>> = HashMap::new();
    for photo in photos {
        if let Some(task_id) = photo.task_id {
            grouped.entry(task_id).or_default().push(photo);
        }
    }
    Ok(grouped)
}

/// Photos of one task as seen by `viewer`: admins and the assignee see all,
/// the project's client sees approved ones, anyone else is refused.
pub async fn task_photos_for(pool: &PgPool, viewer: &Profile, task_id: Uuid) -> Result<Vec<Photo>, ServiceError> {
    let row: Option<(Option<Uuid>, Option<Uuid>)> = sqlx::query_as(
        "SELECT t.assigned_to, p.client_id FROM tasks t JOIN projects p ON p.id = t.project_id WHERE t.id = $1",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;
    let (assigned_to, client_id) = row.ok_or_else(|| ServiceError::not_found("task", task_id))?;

    let approved_only = match viewer.role {
        UserRole::Admin => false,
        UserRole::Worker if assigned_to == Some(viewer.id) => false,
        UserRole::Client if client_id == Some(viewer.id) => true,
        _ => return Err(ServiceError::not_found("task", task_id)),
    };

    let photos = sqlx::query_as::<_, Photo>(
        "SELECT * FROM photos WHERE task_id = $1 AND (is_approved OR NOT $2) ORDER BY created_at DESC",
    )
    .bind(task_id)
    .bind(approved_only)
    .fetch_all(pool)
    .await?;
    Ok(photos)
}

/// Photos of one project as seen by `viewer`: admins and workers with a task
/// there see all, the owning client sees approved ones, anyone else is refused.
pub async fn project_photos_for(pool: &PgPool, viewer: &Profile, project_id: Uuid) -> Result<Vec<Photo>, ServiceError> {
    let client_id: Option<Option<Uuid>> = sqlx::query_scalar("SELECT client_id FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
    let client_id = client_id.ok_or_else(|| ServiceError::not_found("project", project_id))?;

    let approved_only = match viewer.role {
        UserRole::Admin => false,
        UserRole::Worker if worker_has_task_on(pool, viewer.id, project_id).await? => false,
        UserRole::Client if client_id == Some(viewer.id) => true,
        _ => return Err(ServiceError::not_found("project", project_id)),
    };

    let photos = sqlx::query_as::<_, Photo>(
        "SELECT * FROM photos WHERE project_id = $1 AND (is_approved OR NOT $2) ORDER BY created_at DESC",
    )
    .bind(project_id)
    .bind(approved_only)
    .fetch_all(pool)
    .await?;
    Ok(photos)
}

#[cfg(test)]
#[path = "photo_test.rs"]
mod tests;
