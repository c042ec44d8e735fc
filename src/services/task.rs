//! Task CRUD, the worker workflow and admin review.
//!
//! ARCHITECTURE
//! ============
//! Workflow actions (start, submit, approve, reject) lock the task row, check
//! the actor and the transition against [`TaskStatus::can_transition`], then
//! apply an update conditional on the status they observed. A duplicate click
//! therefore sees the new status and gets `InvalidTransition` instead of
//! applying twice.
//!
//! Every action that tells someone about it writes the notification in the
//! same transaction as the task update.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use super::cascade::{self, Removed};
use super::error::{ServiceError, ValidationError, check_range, is_foreign_key_violation, optional_text, required_text};
use super::notification::{self, Notified};
use super::photo;
use crate::locale::{Locale, NotificationText};
use crate::model::{Photo, Priority, Task, TaskStatus, nullable};

/// Review queue size shown on the admin dashboard.
pub const REVIEW_QUEUE_LIMIT: i64 = 5;

pub const MAX_QUALITY_SCORE: i16 = 10;

/// Task row joined with the names a list view shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    #[serde(flatten)]
    pub task: Task,
    pub project_name: String,
    pub worker_name: Option<String>,
}

impl FromRow<'_, PgRow> for TaskSummary {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            task: Task::from_row(row)?,
            project_name: row.try_get("project_name")?,
            worker_name: row.try_get("worker_name")?,
        })
    }
}

/// Summary plus the task's photos, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub summary: TaskSummary,
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specifications: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Admin edit. Any status may be set here; the workflow rules apply to
/// worker and review actions only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub project_id: Option<Uuid>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub specifications: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Approval {
    pub quality_score: i16,
    #[serde(default)]
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rejection {
    #[serde(default)]
    pub review_notes: String,
}

// =============================================================================
// RULES
// =============================================================================

pub fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<(), ServiceError> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

pub fn check_assignee(task: &Task, worker_id: Uuid) -> Result<(), ServiceError> {
    if task.assigned_to == Some(worker_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("task is not assigned to this worker"))
    }
}

pub fn check_quality_score(score: i16) -> Result<(), ValidationError> {
    check_range("quality_score", i64::from(score), 0, i64::from(MAX_QUALITY_SCORE))
}

/// Notes are mandatory when rejecting; returns them trimmed.
pub fn rejection_notes(rejection: &Rejection) -> Result<String, ValidationError> {
    let notes = rejection.review_notes.trim();
    if notes.is_empty() {
        return Err(ValidationError::RejectionNotesRequired);
    }
    Ok(notes.to_owned())
}

fn task_link(id: Uuid) -> String {
    format!("/tasks/{id}")
}

fn map_reference(err: sqlx::Error) -> ServiceError {
    if is_foreign_key_violation(&err) {
        ValidationError::UnknownReference("project_id or assigned_to").into()
    } else {
        err.into()
    }
}

// =============================================================================
// QUERIES
// =============================================================================

#[cfg(test)]
pub(crate) async fn get_task(pool: &PgPool, id: Uuid) -> Result<Task, ServiceError> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("task", id))
}

/// All tasks with project and worker names, newest first.
pub async fn list_tasks(pool: &PgPool) -> Result<Vec<TaskSummary>, sqlx::Error> {
    sqlx::query_as::<_, TaskSummary>(
        r"SELECT t.*, p.name AS project_name, w.full_name AS worker_name
          FROM tasks t
          JOIN projects p ON p.id = t.project_id
          LEFT JOIN profiles w ON w.id = t.assigned_to
          ORDER BY t.created_at DESC",
    )
    .fetch_all(pool)
    .await
}

/// Tasks waiting for review, newest first, with their photos.
pub async fn review_queue(pool: &PgPool, limit: i64) -> Result<Vec<TaskDetail>, sqlx::Error> {
    let summaries = sqlx::query_as::<_, TaskSummary>(
        r"SELECT t.*, p.name AS project_name, w.full_name AS worker_name
          FROM tasks t
          JOIN projects p ON p.id = t.project_id
          LEFT JOIN profiles w ON w.id = t.assigned_to
          WHERE t.status = 'review'
          ORDER BY t.created_at DESC
          LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    with_photos(pool, summaries).await
}

/// A worker's pending, in-progress and in-review tasks by due date.
pub async fn worker_tasks(pool: &PgPool, worker_id: Uuid) -> Result<Vec<TaskDetail>, sqlx::Error> {
    let open: Vec<&str> = TaskStatus::OPEN_FOR_WORKER.iter().map(|s| s.as_str()).collect();
    let summaries = sqlx::query_as::<_, TaskSummary>(
        r"SELECT t.*, p.name AS project_name, w.full_name AS worker_name
          FROM tasks t
          JOIN projects p ON p.id = t.project_id
          LEFT JOIN profiles w ON w.id = t.assigned_to
          WHERE t.assigned_to = $1 AND t.status = ANY($2)
          ORDER BY t.due_date ASC NULLS LAST, t.created_at ASC",
    )
    .bind(worker_id)
    .bind(open)
    .fetch_all(pool)
    .await?;
    with_photos(pool, summaries).await
}

async fn with_photos(pool: &PgPool, summaries: Vec<TaskSummary>) -> Result<Vec<TaskDetail>, sqlx::Error> {
    let ids: Vec<Uuid> = summaries.iter().map(|s| s.task.id).collect();
    let mut photos = photo::photos_by_task(pool, &ids).await?;
    Ok(summaries
        .into_iter()
        .map(|summary| {
            let photos = photos.remove(&summary.task.id).unwrap_or_default();
            TaskDetail { summary, photos }
        })
        .collect())
}

async fn lock_task(conn: &mut PgConnection, id: Uuid) -> Result<Task, ServiceError> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("task", id))
}

/// Conditional status update; fails when the status moved under us.
async fn set_status(conn: &mut PgConnection, id: Uuid, from: TaskStatus, to: TaskStatus) -> Result<Task, ServiceError> {
    sqlx::query_as::<_, Task>("UPDATE tasks SET status = $3 WHERE id = $1 AND status = $2 RETURNING *")
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(conn)
        .await?
        .ok_or(ServiceError::InvalidTransition { from, to })
}

// =============================================================================
// ADMIN CRUD
// =============================================================================

/// Create a task and notify its assignee.
pub async fn create_task(pool: &PgPool, locale: Locale, input: &NewTask) -> Result<Notified<Task>, ServiceError> {
    let title = required_text("title", &input.title)?;

    let mut tx = pool.begin().await?;
    let task = sqlx::query_as::<_, Task>(
        r"INSERT INTO tasks (project_id, title, description, specifications, assigned_to, priority, due_date)
          VALUES ($1, $2, $3, $4, $5, $6, $7)
          RETURNING *",
    )
    .bind(input.project_id)
    .bind(&title)
    .bind(optional_text(input.description.as_deref()))
    .bind(optional_text(input.specifications.as_deref()))
    .bind(input.assigned_to)
    .bind(input.priority.as_str())
    .bind(input.due_date)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_reference)?;

    let mut notifications = Vec::new();
    if let Some(worker_id) = task.assigned_to {
        let link = task_link(task.id);
        let note = notification::notify(
            &mut *tx,
            locale,
            worker_id,
            &NotificationText::TaskAssigned { title: &title },
            Some(&link),
        )
        .await?;
        notifications.push(note);
    }
    tx.commit().await?;

    tracing::info!(task_id = %task.id, project_id = %task.project_id, "task created");
    Ok(Notified::new(task, notifications))
}

pub async fn update_task(pool: &PgPool, id: Uuid, patch: &TaskPatch) -> Result<Task, ServiceError> {
    let title = patch.title.as_deref().map(|t| required_text("title", t)).transpose()?;
    let description = patch.description.as_ref().map(|d| optional_text(d.as_deref()));
    let specifications = patch.specifications.as_ref().map(|s| optional_text(s.as_deref()));
    let assigned_to = patch.assigned_to.flatten();

    sqlx::query_as::<_, Task>(
        r"UPDATE tasks SET
              project_id = COALESCE($2, project_id),
              title = COALESCE($3, title),
              description = CASE WHEN $4 THEN $5 ELSE description END,
              specifications = CASE WHEN $6 THEN $7 ELSE specifications END,
              assigned_to = CASE WHEN $8 THEN $9 ELSE assigned_to END,
              status = COALESCE($10, status),
              priority = COALESCE($11, priority),
              due_date = CASE WHEN $12 THEN $13 ELSE due_date END,
              completed_at = CASE
                  WHEN $10 IS NULL THEN completed_at
                  WHEN $10 = 'approved' THEN COALESCE(completed_at, now())
                  ELSE NULL
              END
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(patch.project_id)
    .bind(title)
    .bind(description.is_some())
    .bind(description.flatten())
    .bind(specifications.is_some())
    .bind(specifications.flatten())
    .bind(patch.assigned_to.is_some())
    .bind(assigned_to)
    .bind(patch.status.map(TaskStatus::as_str))
    .bind(patch.priority.map(Priority::as_str))
    .bind(patch.due_date.is_some())
    .bind(patch.due_date.flatten())
    .fetch_optional(pool)
    .await
    .map_err(map_reference)?
    .ok_or_else(|| ServiceError::not_found("task", id))
}

/// Delete a task and its photos.
pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<Removed<Task>, ServiceError> {
    let mut tx = pool.begin().await?;
    let task = lock_task(&mut *tx, id).await?;
    let cascade = cascade::remove_task_dependents(&mut *tx, id).await?;
    sqlx::query("DELETE FROM tasks WHERE id = $1").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;
    tracing::info!(task_id = %id, photos = cascade.photos.len(), "task deleted");
    Ok(Removed { value: task, cascade })
}
// =============================================================================
// WORKER WORKFLOW
// =============================================================================

/// Start (or restart after rejection) an assigned task.
pub async fn start_task(pool: &PgPool, worker_id: Uuid, id: Uuid) -> Result<Task, ServiceError> {
    let mut tx = pool.begin().await?;
    let task = lock_task(&mut *tx, id).await?;
    check_assignee(&task, worker_id)?;
    check_transition(task.status, TaskStatus::InProgress)?;
    let updated = set_status(&mut *tx, id, task.status, TaskStatus::InProgress).await?;
    tx.commit().await?;

    tracing::info!(task_id = %id, %worker_id, "task started");
    Ok(updated)
}

/// Submit an assigned task for review. Needs at least one photo; notifies the
/// project's client when there is one.
pub async fn submit_task(pool: &PgPool, locale: Locale, worker_id: Uuid, id: Uuid) -> Result<Notified<Task>, ServiceError> {
    let mut tx = pool.begin().await?;
    let task = lock_task(&mut *tx, id).await?;
    check_assignee(&task, worker_id)?;
    check_transition(task.status, TaskStatus::Review)?;

    let photos: i64 = sqlx::query_scalar("SELECT count(*) FROM photos WHERE task_id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if photos == 0 {
        return Err(ValidationError::PhotoRequired.into());
    }

    let updated = set_status(&mut *tx, id, task.status, TaskStatus::Review).await?;

    let client_id: Option<Uuid> = sqlx::query_scalar("SELECT client_id FROM projects WHERE id = $1")
        .bind(updated.project_id)
        .fetch_one(&mut *tx)
        .await?;
    let mut notifications = Vec::new();
    if let Some(client_id) = client_id {
        let note = notification::notify(
            &mut *tx,
            locale,
            client_id,
            &NotificationText::TaskSubmitted { title: &updated.title },
            None,
        )
        .await?;
        notifications.push(note);
    }
    tx.commit().await?;

    tracing::info!(task_id = %id, %worker_id, "task submitted for review");
    Ok(Notified::new(updated, notifications))
}

// =============================================================================
// REVIEW
// =============================================================================

/// Approve a task in review: score it, stamp `completed_at`, approve its
/// photos, fold the score into the worker's rating and notify the worker.
pub async fn approve_task(pool: &PgPool, locale: Locale, id: Uuid, approval: &Approval) -> Result<Notified<Task>, ServiceError> {
    check_quality_score(approval.quality_score)?;
    let notes = optional_text(approval.review_notes.as_deref());

    let mut tx = pool.begin().await?;
    let task = lock_task(&mut *tx, id).await?;
    check_transition(task.status, TaskStatus::Approved)?;

    let approved = sqlx::query_as::<_, Task>(
        r"UPDATE tasks SET
              status = 'approved',
              quality_score = $2,
              review_notes = COALESCE($3, review_notes),
              completed_at = now()
          WHERE id = $1 AND status = 'review'
          RETURNING *",
    )
    .bind(id)
    .bind(approval.quality_score)
    .bind(notes)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ServiceError::InvalidTransition { from: task.status, to: TaskStatus::Approved })?;

    sqlx::query("UPDATE photos SET is_approved = true WHERE task_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let mut notifications = Vec::new();
    if let Some(worker_id) = approved.assigned_to {
        sqlx::query(
            r"UPDATE profiles SET
                  rating = (rating * total_ratings + $2) / (total_ratings + 1),
                  total_ratings = total_ratings + 1
              WHERE id = $1",
        )
        .bind(worker_id)
        .bind(f64::from(approval.quality_score))
        .execute(&mut *tx)
        .await?;

        let link = task_link(id);
        let note = notification::notify(
            &mut *tx,
            locale,
            worker_id,
            &NotificationText::TaskApproved { title: &approved.title, score: approval.quality_score },
            Some(&link),
        )
        .await?;
        notifications.push(note);
    }
    tx.commit().await?;

    tracing::info!(task_id = %id, score = approval.quality_score, "task approved");
    Ok(Notified::new(approved, notifications))
}

/// Reject a task in review with mandatory notes and notify the worker.
pub async fn reject_task(pool: &PgPool, locale: Locale, id: Uuid, rejection: &Rejection) -> Result<Notified<Task>, ServiceError> {
    let notes = rejection_notes(rejection)?;

    let mut tx = pool.begin().await?;
    let task = lock_task(&mut *tx, id).await?;
    check_transition(task.status, TaskStatus::Rejected)?;

    let rejected = sqlx::query_as::<_, Task>(
        "UPDATE tasks SET status = 'rejected', review_notes = $2 WHERE id = $1 AND status = 'review' RETURNING *",
    )
    .bind(id)
    .bind(&notes)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ServiceError::InvalidTransition { from: task.status, to: TaskStatus::Rejected })?;

    let mut notifications = Vec::new();
    if let Some(worker_id) = rejected.assigned_to {
        let link = task_link(id);
        let note = notification::notify(
            &mut *tx,
            locale,
            worker_id,
            &NotificationText::TaskRejected { title: &rejected.title, notes: &notes },
            Some(&link),
        )
        .await?;
        notifications.push(note);
    }
    tx.commit().await?;

    tracing::info!(task_id = %id, "task rejected");
    Ok(Notified::new(rejected, notifications))
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;
