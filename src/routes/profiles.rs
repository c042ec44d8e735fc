//! User management routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::{publish, publish_cascade};
use crate::model::{Profile, UserRole};
use crate::services::auth::{self as auth_svc, SignUp, SignUpOrigin};
use crate::services::profile::{self, ProfilePatch};
use crate::services::realtime::{ChangeOp, Table};
use crate::state::AppState;

/// `GET /api/profiles`
pub async fn list(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<Profile>>, ApiError> {
    caller.require(UserRole::Admin)?;
    Ok(Json(profile::list_profiles(&state.pool).await?))
}

/// `GET /api/profiles/workers`: assignable workers.
pub async fn active_workers(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<Profile>>, ApiError> {
    caller.require(UserRole::Admin)?;
    Ok(Json(profile::list_active_workers(&state.pool).await?))
}

/// `POST /api/profiles`: admin creates an account of any role.
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<SignUp>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(UserRole::Admin)?;
    let created = auth_svc::sign_up(&state.pool, &input, SignUpOrigin::Admin).await?;
    publish(&state, Table::Profiles, ChangeOp::Insert, created.id, &created);
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PATCH /api/profiles/{id}`: admins edit anyone; others only their own
/// name and phone.
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>, ApiError> {
    if caller.role() != UserRole::Admin {
        if caller.id() != id {
            return Err(ApiError::forbidden());
        }
        profile::check_self_patch(&patch)?;
    }
    let updated = profile::update_profile(&state.pool, id, &patch).await?;
    publish(&state, Table::Profiles, ChangeOp::Update, id, &updated);
    Ok(Json(updated))
}

/// `DELETE /api/profiles/{id}`
pub async fn delete(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    caller.require(UserRole::Admin)?;
    let removed = profile::delete_profile(&state.pool, caller.id(), id).await?;
    tracing::info!(profile_id = %id, by = %caller.id(), "profile deleted");
    publish(&state, Table::Profiles, ChangeOp::Delete, id, &removed.value);
    publish_cascade(&state, &removed.cascade).await;
    Ok(StatusCode::NO_CONTENT)
}
