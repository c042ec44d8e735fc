//! Dashboards: role-gated home, admin panels, worker home, client portal.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use uuid::Uuid;

use super::auth::{AuthUser, Caller};
use super::error::ApiError;
use crate::model::UserRole;
use crate::services::auth as auth_svc;
use crate::services::check_in::{self, ActivityEntry, WorkerHome};
use crate::services::home::{self, Home};
use crate::services::portal::{self, ClientProject, Portal};
use crate::services::stats::{self, DashboardStats, WorkerStats};
use crate::state::AppState;

/// `GET /api/home`: the caller's landing view; `login` without a session.
pub async fn home(State(state): State<AppState>, auth: Result<AuthUser, ApiError>) -> Result<Json<Home>, ApiError> {
    let user = match auth {
        Ok(auth) => Some(auth.user),
        Err(e) if e.status == StatusCode::UNAUTHORIZED => None,
        Err(e) => return Err(e),
    };
    let profile = match &user {
        Some(user) => Some(auth_svc::ensure_profile(&state.pool, user).await?),
        None => None,
    };
    let loaded = home::load_home(&state.pool, &state.stats, user.as_ref(), profile.as_ref(), Utc::now()).await?;
    Ok(Json(loaded))
}

/// `GET /api/admin/stats`
pub async fn stats(State(state): State<AppState>, caller: Caller) -> Result<Json<DashboardStats>, ApiError> {
    caller.require(UserRole::Admin)?;
    Ok(Json(state.stats.get_or_refresh(&state.pool).await?))
}

/// `GET /api/admin/worker-stats`
pub async fn worker_stats(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<WorkerStats>>, ApiError> {
    caller.require(UserRole::Admin)?;
    Ok(Json(stats::worker_stats(&state.pool).await?))
}

/// `GET /api/admin/activity`: today's check-ins.
pub async fn activity(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    caller.require(UserRole::Admin)?;
    Ok(Json(check_in::today_activity(&state.pool, Utc::now()).await?))
}

/// `GET /api/worker/home`
pub async fn worker_home(State(state): State<AppState>, caller: Caller) -> Result<Json<WorkerHome>, ApiError> {
    caller.require(UserRole::Worker)?;
    Ok(Json(check_in::worker_home(&state.pool, caller.id(), Utc::now()).await?))
}

/// `GET /api/portal`
pub async fn portal(State(state): State<AppState>, caller: Caller) -> Result<Json<Portal>, ApiError> {
    caller.require(UserRole::Client)?;
    Ok(Json(portal::client_portal(&state.pool, caller.id(), Utc::now()).await?))
}

/// `GET /api/portal/projects/{id}`
pub async fn portal_project(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientProject>, ApiError> {
    caller.require(UserRole::Client)?;
    Ok(Json(portal::client_project(&state.pool, caller.id(), id, Utc::now()).await?))
}
