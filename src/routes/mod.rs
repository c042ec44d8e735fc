//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API under `/api`, the realtime websocket at
//! `/api/ws`, stored photos under the media prefix and `/healthz` into a
//! single Axum router. Handlers publish a realtime change after every
//! committed mutation through [`publish`].

pub mod auth;
pub mod check_ins;
pub mod dashboard;
pub mod error;
pub mod issues;
pub mod notifications;
pub mod photos;
pub mod profiles;
pub mod projects;
pub mod tasks;
pub mod ws;

use std::convert::Infallible;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::model::Notification;
use crate::services::realtime::{Change, ChangeOp, Table};
use crate::services::cascade::Cascade;
use crate::services::{stats, storage};
use crate::state::AppState;

/// Multipart framing allowance on top of the photo size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Publish one committed row change to the realtime hub.
pub(crate) fn publish(state: &AppState, table: Table, op: ChangeOp, id: Uuid, row: &impl Serialize) {
    let change = Change::new(table, op, id, row);
    if stats::affects_dashboard(&change) {
        state.stats.invalidate();
    }
    state.hub.publish(change);
}

/// Publish the notification rows written alongside a mutation.
pub(crate) fn publish_notifications(state: &AppState, notifications: &[Notification]) {
    for n in notifications {
        publish(state, Table::Notifications, ChangeOp::Insert, n.id, n);
    }
}

/// Publish the rows removed or detached with a deleted parent, then delete
/// the stored files of removed photos.
pub(crate) async fn publish_cascade(state: &AppState, cascade: &Cascade) {
    if cascade.is_empty() {
        return;
    }
    for p in &cascade.photos {
        publish(state, Table::Photos, ChangeOp::Delete, p.id, p);
    }
    for c in &cascade.check_ins {
        publish(state, Table::CheckIns, ChangeOp::Delete, c.id, c);
    }
    for i in &cascade.issues {
        publish(state, Table::Issues, ChangeOp::Delete, i.id, i);
    }
    for n in &cascade.notifications {
        publish(state, Table::Notifications, ChangeOp::Delete, n.id, n);
    }
    for t in &cascade.tasks {
        publish(state, Table::Tasks, ChangeOp::Delete, t.id, t);
    }
    for t in &cascade.unassigned_tasks {
        publish(state, Table::Tasks, ChangeOp::Update, t.id, t);
    }
    for p in &cascade.orphaned_projects {
        publish(state, Table::Projects, ChangeOp::Update, p.id, p);
    }
    storage::remove_urls(state.storage.as_ref(), cascade.photo_urls()).await;
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/auth/me", get(auth::me))
        .route("/auth/ws-ticket", post(auth::ws_ticket))
        .route("/home", get(dashboard::home))
        .route("/admin/stats", get(dashboard::stats))
        .route("/admin/worker-stats", get(dashboard::worker_stats))
        .route("/admin/activity", get(dashboard::activity))
        .route("/profiles", get(profiles::list).post(profiles::create))
        .route("/profiles/workers", get(profiles::active_workers))
        .route("/profiles/{id}", patch(profiles::update).delete(profiles::delete))
        .route("/projects", get(projects::list).post(projects::create))
        .route("/projects/{id}", get(projects::get).patch(projects::update).delete(projects::delete))
        .route("/tasks", get(tasks::list).post(tasks::create))
        .route("/tasks/review", get(tasks::review_queue))
        .route("/tasks/{id}", patch(tasks::update).delete(tasks::delete))
        .route("/tasks/{id}/approve", post(tasks::approve))
        .route("/tasks/{id}/reject", post(tasks::reject))
        .route("/tasks/{id}/start", post(tasks::start))
        .route("/tasks/{id}/submit", post(tasks::submit))
        .route("/projects/{id}/photos", get(photos::project_photos))
        .route("/tasks/{id}/photos", get(photos::task_photos))
        .route("/worker/tasks", get(tasks::worker_tasks))
        .route("/worker/home", get(dashboard::worker_home))
        .route("/check-ins", post(check_ins::check_in))
        .route("/check-ins/check-out", post(check_ins::check_out))
        .route("/issues", get(issues::list_open).post(issues::report))
        .route("/issues/{id}/progress", post(issues::mark_in_progress))
        .route("/issues/{id}/resolve", post(issues::resolve))
        .route(
            "/photos",
            post(photos::upload)
                .layer::<_, Infallible>(DefaultBodyLimit::disable())
                .layer::<_, Infallible>(RequestBodyLimitLayer::new(upload_limit)),
        )
        .route("/photos/{id}/approve", post(photos::approve))
        .route("/portal", get(dashboard::portal))
        .route("/portal/projects/{id}", get(dashboard::portal_project))
        .route("/notifications", get(notifications::latest))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/ws", get(ws::handle_ws))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let media = ServeDir::new(&state.config.media_dir);
    let media_prefix = state.config.media_url_prefix.clone();

    Router::new()
        .nest("/api", api_routes(&state))
        .route("/healthz", get(healthz))
        .nest_service(&media_prefix, media)
        .layer(middleware::from_fn_with_state(state.clone(), error::localize_errors))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
