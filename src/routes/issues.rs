//! Issue routes: worker reports, admin triage.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::tasks::LimitQuery;
use super::{publish, publish_notifications};
use crate::model::{Issue, UserRole};
use crate::services::issue::{self, IssueSummary, NewIssue, OPEN_ISSUES_LIMIT};
use crate::services::realtime::{ChangeOp, Table};
use crate::state::AppState;

/// `GET /api/issues[?limit=n]`: open and in-progress issues.
pub async fn list_open(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<IssueSummary>>, ApiError> {
    caller.require(UserRole::Admin)?;
    let limit = query.limit.unwrap_or(OPEN_ISSUES_LIMIT).clamp(1, 100);
    Ok(Json(issue::list_open(&state.pool, limit).await?))
}

/// `POST /api/issues`
pub async fn report(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewIssue>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require_any(&[UserRole::Worker, UserRole::Admin])?;
    let reported = issue::report_issue(&state.pool, state.config.default_locale, &caller.profile, &input).await?;
    publish(&state, Table::Issues, ChangeOp::Insert, reported.value.id, &reported.value);
    publish_notifications(&state, &reported.notifications);
    Ok((StatusCode::CREATED, Json(reported.value)))
}

/// `POST /api/issues/{id}/progress`
pub async fn mark_in_progress(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Issue>, ApiError> {
    caller.require(UserRole::Admin)?;
    let updated = issue::mark_in_progress(&state.pool, id).await?;
    publish(&state, Table::Issues, ChangeOp::Update, id, &updated);
    Ok(Json(updated))
}

/// `POST /api/issues/{id}/resolve`
pub async fn resolve(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<Json<Issue>, ApiError> {
    caller.require(UserRole::Admin)?;
    let resolved = issue::resolve(&state.pool, id).await?;
    publish(&state, Table::Issues, ChangeOp::Update, id, &resolved);
    Ok(Json(resolved))
}
