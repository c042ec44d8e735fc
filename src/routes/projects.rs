//! Project routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::{publish, publish_cascade};
use crate::model::{Project, UserRole};
use crate::services::error::ServiceError;
use crate::services::project::{self, NewProject, ProjectPatch};
use crate::services::realtime::{ChangeOp, Table};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active: bool,
}

/// `GET /api/projects[?active=true]`
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    caller.require(UserRole::Admin)?;
    let projects = if query.active {
        project::list_active_projects(&state.pool).await?
    } else {
        project::list_projects(&state.pool).await?
    };
    Ok(Json(projects))
}

/// `GET /api/projects/{id}`: admins see any project, clients only their own.
pub async fn get(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<Json<Project>, ApiError> {
    caller.require_any(&[UserRole::Admin, UserRole::Client])?;
    let found = project::get_project(&state.pool, id).await?;
    if caller.role() == UserRole::Client && found.client_id != Some(caller.id()) {
        return Err(ServiceError::not_found("project", id).into());
    }
    Ok(Json(found))
}

/// `POST /api/projects`
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewProject>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(UserRole::Admin)?;
    let created = project::create_project(&state.pool, &input).await?;
    publish(&state, Table::Projects, ChangeOp::Insert, created.id, &created);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PATCH /api/projects/{id}`
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, ApiError> {
    caller.require(UserRole::Admin)?;
    let updated = project::update_project(&state.pool, id, &patch).await?;
    publish(&state, Table::Projects, ChangeOp::Update, id, &updated);
    Ok(Json(updated))
}

/// `DELETE /api/projects/{id}`
pub async fn delete(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    caller.require(UserRole::Admin)?;
    let removed = project::delete_project(&state.pool, id).await?;
    publish(&state, Table::Projects, ChangeOp::Delete, id, &removed.value);
    publish_cascade(&state, &removed.cascade).await;
    Ok(StatusCode::NO_CONTENT)
}
