//! Task routes: admin CRUD and review, worker workflow.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::{publish, publish_cascade, publish_notifications};
use crate::model::{Task, UserRole};
use crate::services::notification::Notified;
use crate::services::photo;
use crate::services::realtime::{ChangeOp, Table};
use crate::services::task::{self, Approval, NewTask, REVIEW_QUEUE_LIMIT, Rejection, TaskDetail, TaskPatch, TaskSummary};
use crate::state::AppState;

/// Publish a task update and the notifications written with it.
fn publish_task(state: &AppState, op: ChangeOp, notified: &Notified<Task>) {
    publish(state, Table::Tasks, op, notified.value.id, &notified.value);
    publish_notifications(state, &notified.notifications);
}

/// `GET /api/tasks`
pub async fn list(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<TaskSummary>>, ApiError> {
    caller.require(UserRole::Admin)?;
    Ok(Json(task::list_tasks(&state.pool).await?))
}

/// `POST /api/tasks`: create and notify the assignee.
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewTask>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(UserRole::Admin)?;
    let created = task::create_task(&state.pool, state.config.default_locale, &input).await?;
    publish_task(&state, ChangeOp::Insert, &created);
    Ok((StatusCode::CREATED, Json(created.value)))
}

/// `PATCH /api/tasks/{id}`
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    caller.require(UserRole::Admin)?;
    let updated = task::update_task(&state.pool, id, &patch).await?;
    publish(&state, Table::Tasks, ChangeOp::Update, id, &updated);
    Ok(Json(updated))
}

/// `DELETE /api/tasks/{id}`
pub async fn delete(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    caller.require(UserRole::Admin)?;
    let removed = task::delete_task(&state.pool, id).await?;
    publish(&state, Table::Tasks, ChangeOp::Delete, id, &removed.value);
    publish_cascade(&state, &removed.cascade).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// `GET /api/tasks/review[?limit=n]`
pub async fn review_queue(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TaskDetail>>, ApiError> {
    caller.require(UserRole::Admin)?;
    let limit = query.limit.unwrap_or(REVIEW_QUEUE_LIMIT).clamp(1, 100);
    Ok(Json(task::review_queue(&state.pool, limit).await?))
}

/// `POST /api/tasks/{id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(approval): Json<Approval>,
) -> Result<Json<Task>, ApiError> {
    caller.require(UserRole::Admin)?;
    let approved = task::approve_task(&state.pool, state.config.default_locale, id, &approval).await?;
    publish_task(&state, ChangeOp::Update, &approved);
    // Approval also approved the task's photos.
    match photo::photos_by_task(&state.pool, &[id]).await {
        Ok(mut photos) => {
            for p in photos.remove(&id).unwrap_or_default() {
                publish(&state, Table::Photos, ChangeOp::Update, p.id, &p);
            }
        }
        Err(e) => tracing::warn!(error = %e, task_id = %id, "approved photos not published"),
    }
    Ok(Json(approved.value))
}

/// `POST /api/tasks/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(rejection): Json<Rejection>,
) -> Result<Json<Task>, ApiError> {
    caller.require(UserRole::Admin)?;
    let rejected = task::reject_task(&state.pool, state.config.default_locale, id, &rejection).await?;
    publish_task(&state, ChangeOp::Update, &rejected);
    Ok(Json(rejected.value))
}

/// `GET /api/worker/tasks`
pub async fn worker_tasks(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<TaskDetail>>, ApiError> {
    caller.require(UserRole::Worker)?;
    Ok(Json(task::worker_tasks(&state.pool, caller.id()).await?))
}

/// `POST /api/tasks/{id}/start`
pub async fn start(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<Json<Task>, ApiError> {
    caller.require(UserRole::Worker)?;
    let started = task::start_task(&state.pool, caller.id(), id).await?;
    publish(&state, Table::Tasks, ChangeOp::Update, id, &started);
    Ok(Json(started))
}

/// `POST /api/tasks/{id}/submit`
pub async fn submit(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<Json<Task>, ApiError> {
    caller.require(UserRole::Worker)?;
    let submitted = task::submit_task(&state.pool, state.config.default_locale, caller.id(), id).await?;
    publish_task(&state, ChangeOp::Update, &submitted);
    Ok(Json(submitted.value))
}
