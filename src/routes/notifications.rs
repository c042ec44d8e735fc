//! Notification routes. Every handler acts on the caller's own rows.

use axum::extract::{Path, State};
use axum::response::Json;
use uuid::Uuid;

use super::auth::Caller;
use super::error::ApiError;
use super::publish;
use crate::model::Notification;
use crate::services::notification::{self, NotificationFeed};
use crate::services::realtime::{ChangeOp, Table};
use crate::state::AppState;

/// `GET /api/notifications`: latest ten plus unread count.
pub async fn latest(State(state): State<AppState>, caller: Caller) -> Result<Json<NotificationFeed>, ApiError> {
    Ok(Json(notification::latest(&state.pool, caller.id()).await?))
}

/// `POST /api/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let read = notification::mark_read(&state.pool, caller.id(), id).await?;
    publish(&state, Table::Notifications, ChangeOp::Update, id, &read);
    Ok(Json(read))
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read(State(state): State<AppState>, caller: Caller) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = notification::mark_all_read(&state.pool, caller.id()).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
