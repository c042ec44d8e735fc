//! Worker check-in routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::publish;
use crate::model::{CheckIn, UserRole};
use crate::services::check_in;
use crate::services::realtime::{ChangeOp, Table};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInBody {
    pub project_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckOutBody {
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /api/check-ins`
pub async fn check_in(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CheckInBody>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(UserRole::Worker)?;
    let row = check_in::check_in(&state.pool, caller.id(), body.project_id).await?;
    publish(&state, Table::CheckIns, ChangeOp::Insert, row.id, &row);
    Ok((StatusCode::CREATED, Json(row)))
}

/// `POST /api/check-ins/check-out`
pub async fn check_out(
    State(state): State<AppState>,
    caller: Caller,
    body: Option<Json<CheckOutBody>>,
) -> Result<Json<CheckIn>, ApiError> {
    caller.require(UserRole::Worker)?;
    let notes = body.and_then(|Json(b)| b.notes);
    let row = check_in::check_out(&state.pool, caller.id(), notes.as_deref()).await?;
    publish(&state, Table::CheckIns, ChangeOp::Update, row.id, &row);
    Ok(Json(row))
}
