//! WebSocket handler for realtime row changes.
//!
//! DESIGN
//! ======
//! On upgrade the connection gets a [`Subscriptions`] set scoped to the
//! caller's role, then enters a `select!` loop:
//! - Incoming client frames → `sub:*` requests that edit the set
//! - Committed changes from the `ChangeHub` → filtered, forwarded as
//!   `change:<op>` frames
//!
//! A connection that falls behind the hub reloads its scope from the
//! database (ownership may have changed in the skipped events), then receives
//! `change:resync` and is expected to refetch whatever it renders.
//!
//! LIFECYCLE
//! =========
//! 1. `GET /api/ws?ticket=...` → ticket consumed, profile loaded
//! 2. Upgrade → send `session:connected` with `user_id` and `role`
//! 3. Client subscribes → changes flow until close

use std::collections::{HashMap, HashSet};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::model::UserRole;
use crate::services::realtime::{self, Filter, RealtimeError, Scope, Subscriptions};
use crate::services::{profile, project, session};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let user_id = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(uid)) => uid,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    let scope = match load_scope(&state, user_id).await {
        Ok(Some(scope)) => scope,
        Ok(None) => return (StatusCode::FORBIDDEN, "no active profile").into_response(),
        Err(e) => {
            tracing::error!(error = %e, %user_id, "ws scope load failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "profile lookup error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id, scope))
}

/// Role scope for an account; `None` without an active profile.
async fn load_scope(state: &AppState, user_id: Uuid) -> Result<Option<Scope>, sqlx::Error> {
    let Some(profile) = profile::get_profile(&state.pool, user_id).await? else {
        return Ok(None);
    };
    if !profile.is_active {
        return Ok(None);
    }
    let projects = match profile.role {
        UserRole::Client => project::client_project_ids(&state.pool, profile.id).await?,
        UserRole::Admin | UserRole::Worker => HashSet::new(),
    };
    Ok(Some(Scope::for_role(profile.role, profile.id, projects)))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid, scope: Scope) {
    let role = scope_role(&scope);
    let mut subs = Subscriptions::new(scope);
    let mut changes = state.hub.subscribe();

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("user_id", user_id.to_string())
        .with_data("role", role.as_str());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%user_id, role = role.as_str(), "ws: client connected");

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break 'conn };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&mut subs, user_id, &text) {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break 'conn,
                    _ => {}
                }
            }
            change = changes.recv() => {
                let frame = match change {
                    Ok(change) => subs.frame_for(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%user_id, skipped, "ws: change stream lagged");
                        match resync(&state, user_id, &mut subs, skipped).await {
                            Ok(Some(frame)) => Some(frame),
                            Ok(None) => {
                                info!(%user_id, "ws: profile no longer active");
                                break 'conn;
                            }
                            Err(e) => {
                                tracing::error!(error = %e, %user_id, "ws scope reload failed");
                                break 'conn;
                            }
                        }
                    }
                    Err(RecvError::Closed) => break 'conn,
                };
                if let Some(frame) = frame {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break 'conn;
                    }
                }
            }
        }
    }

    info!(%user_id, "ws: client disconnected");
}

/// Reload the scope after missed changes and build the resync frame.
/// `None` once the profile is gone or inactive.
async fn resync(state: &AppState, user_id: Uuid, subs: &mut Subscriptions, skipped: u64) -> Result<Option<Frame>, sqlx::Error> {
    let Some(scope) = load_scope(state, user_id).await? else {
        return Ok(None);
    };
    subs.replace_scope(scope);
    Ok(Some(realtime::resync_frame(skipped)))
}

fn scope_role(scope: &Scope) -> UserRole {
    match scope {
        Scope::Admin => UserRole::Admin,
        Scope::Worker { .. } => UserRole::Worker,
        Scope::Client { .. } => UserRole::Client,
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
fn process_inbound_text(subs: &mut Subscriptions, user_id: Uuid, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%user_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    info!(%user_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let reply = match req.prefix() {
        "sub" => handle_sub(subs, &req),
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };
    vec![reply.unwrap_or_else(|err| err)]
}

fn handle_sub(subs: &mut Subscriptions, req: &Frame) -> Result<Frame, Frame> {
    match req.op() {
        "subscribe" => {
            let table = req.data_str("table").ok_or_else(|| req.error_from(&RealtimeError::MissingField("table")))?;
            let filter = match req.data.get("filter") {
                None | Some(serde_json::Value::Null) => None,
                Some(raw) => Some(
                    serde_json::from_value::<Filter>(raw.clone())
                        .map_err(|e| req.error_from(&RealtimeError::InvalidFilter(e.to_string())))?,
                ),
            };
            let sub = subs.subscribe(table, filter).map_err(|e| req.error_from(&e))?;
            Ok(req.done().with_data("id", sub.id.to_string()).with_data("table", sub.table.as_str()))
        }
        "unsubscribe" => {
            let raw = req.data_str("id").ok_or_else(|| req.error_from(&RealtimeError::MissingField("id")))?;
            let id = Uuid::parse_str(raw).map_err(|_| req.error_from(&RealtimeError::UnknownSubscription(raw.to_owned())))?;
            subs.unsubscribe(id).map_err(|e| req.error_from(&e))?;
            Ok(req.done())
        }
        "list" => {
            let mut data = Data::new();
            data.insert("subscriptions".into(), serde_json::to_value(subs.list().collect::<Vec<_>>()).unwrap_or_default());
            Ok(req.done_with(data))
        }
        op => Err(req.error(format!("unknown sub op: {op}"))),
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        tracing::debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
